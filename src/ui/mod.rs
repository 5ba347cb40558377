pub mod app;
pub mod clock_face;
pub mod theme;
