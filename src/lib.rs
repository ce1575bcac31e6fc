pub mod builder;
pub mod cli;
pub mod detect;
pub mod diff;
pub mod error;
pub mod fuzzy;
pub mod loc;
pub mod model;
pub mod parsers;
pub mod ratio;
pub mod render;
pub mod report;
pub mod threshold;
