//! Training callbacks: restore, checkpointing, and observability

mod registry;
mod restorer;
mod saver;
mod static_viewer;
mod summary_writer;
mod traits;
mod weights_viewer;

pub use registry::CallbackRegistry;
pub use restorer::ModelRestorer;
pub use saver::ModelSaver;
pub use static_viewer::StaticViewer;
pub use summary_writer::SummaryWriter;
pub use traits::{CallbackContext, CallbackPhase, TrainCallback};
pub use weights_viewer::WeightsViewer;
