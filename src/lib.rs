pub mod affinity;
pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod connect;
pub mod dump;
pub mod error;
pub mod events;
pub mod history;
pub mod ir;
pub mod layout;
pub mod orchestrator;
pub mod store;

pub use affinity::{AffinityScore, AffinitySource, AffinityTable, Flow, NoAffinity};
pub use cancel::{CancelHandle, CancelToken, cancel_pair};
#[cfg(feature = "cli")]
pub use cli::run;
pub use collision::{Collision, CollisionDetector};
pub use config::{Config, load_config};
pub use connect::{AutoConnector, ConnectOutcome};
pub use error::{ComposerError, Result};
pub use events::{ComposerEvent, NotificationLevel, RunReport, RunStatus};
pub use history::{History, Snapshot, SnapshotDiff};
pub use ir::{Edge, EdgeKey, Node, Port, PortPair};
pub use layout::{NodePlacement, apply_layout, optimize_layout};
pub use orchestrator::SmartConnect;
pub use store::{CanvasGeometry, CanvasSize, FixedCanvas, MemoryWorkspace, NoCanvas, WorkspaceStore};
