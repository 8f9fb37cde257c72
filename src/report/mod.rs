mod printer;

pub use printer::{print_run, render_json, render_pretty};
