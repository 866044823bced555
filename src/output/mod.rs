mod progress;
mod styling;
mod tables;

pub use progress::Spinner;
pub use styling::{bright, dim, magenta_bold};
pub use tables::{builds_table, transitions_table};

/// Prints the `cipulse` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📡 cipulse"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI build status collector")
    );
}
