pub mod chunk;
pub mod geokey;
pub mod grid;
pub mod loader;
pub mod locate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod table;
