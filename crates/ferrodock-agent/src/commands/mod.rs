pub mod geometry;
pub mod run;
