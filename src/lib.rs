pub use background::{BackgroundRenderer, LayerState, PLACEHOLDER_TEXT};
pub use cgmath;
pub use config::ViewConfig;
pub use error::{ConfigError, ParseError};
pub use network::{Connection, Edge, Junction, Lane, LaneClass, NetworkGeometry, TextMarker};
pub use overlay::{OverlayRenderer, SignalState, VehicleFrameInput};
pub use render::{Canvas, Color, DrawCommand, DrawList, Pass, Stroke};
pub use scheduler::RedrawScheduler;
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use topology::{BusStop, BusStopMarker, EdgePair, Topology};
pub use util::Interval;
pub use view::{NetworkSnapshot, NetworkView, RenderOutcome};
pub use viewport::ViewportTransform;

mod background;
pub mod config;
mod error;
pub mod math;
pub mod network;
pub mod overlay;
pub mod parser;
pub mod render;
mod scheduler;
pub mod topology;
mod util;
mod view;
mod viewport;

new_key_type! {
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of an [Edge].
    pub struct EdgeId;
    /// Unique ID of a [Junction].
    pub struct JunctionId;
}
