pub mod layout;
pub mod svg;

pub use layout::{Band, BandRole, Canvas, DiagramLayout, Edge, Point};
pub use svg::render_svg;
