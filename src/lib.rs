// Library exports for pinsync
pub mod config;
pub mod hints;
pub mod interpreter;
pub mod listing;
pub mod output;
pub mod pypi;
pub mod rewrite;
pub mod selector;
pub mod updater;
