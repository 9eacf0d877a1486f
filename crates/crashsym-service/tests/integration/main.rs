// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

#[cfg(unix)]
pub mod symbolication;
#[cfg(unix)]
pub mod utils;

#[cfg(unix)]
pub use utils::*;
