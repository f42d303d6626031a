use std::io::{Read, Write};
use std::sync::Once;

use color_eyre::eyre;
use vfs::VfsPath;

pub mod prelude {
    pub use crate::{Builder, LogLevel};
    pub use crate::{memory_root, read, write};
    pub use googletest::{assert_that, matchers::*};
    pub use similar_asserts::assert_eq as sim_assert_eq;
}

/// Fresh in-memory filesystem root.
#[must_use]
pub fn memory_root() -> VfsPath {
    VfsPath::new(vfs::MemoryFS::new())
}

/// Write `data` into the virtual filesystem at `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write(path: &VfsPath, data: impl AsRef<[u8]>) -> eyre::Result<VfsPath> {
    let _ = path.parent().create_dir_all();
    let mut file = path.create_file()?;
    file.write_all(data.as_ref())?;
    Ok(path.clone())
}

/// Read a file of the virtual filesystem as UTF-8.
///
/// # Errors
///
/// Returns an error if the file does not exist or is not valid UTF-8.
pub fn read(path: &VfsPath) -> eyre::Result<String> {
    let mut out = String::new();
    path.open_file()?.read_to_string(&mut out)?;
    Ok(out)
}

pub type LogLevel = tracing::metadata::Level;

static INIT_EYRE: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    setup_tracing: bool,
    install_eyre: bool,
    log_level: LogLevel,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            setup_tracing: true,
            install_eyre: true,
            log_level: LogLevel::DEBUG,
        }
    }
}

impl Builder {
    /// Initialize test.
    ///
    /// This ensures `color_eyre` is setup once and test output captures
    /// tracing events.
    ///
    /// # Panics
    ///
    /// Panics if `color_eyre` installation fails.
    pub fn build(self) {
        if self.install_eyre {
            INIT_EYRE.call_once(|| {
                color_eyre::install().expect("failed to install eyre");
            });
        }
        if self.setup_tracing {
            let filter = self.log_level.as_str().to_ascii_lowercase();
            // Another test in the same binary may have installed it already.
            let _ = tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .try_init();
        }
    }

    /// Toggle log level for tracing inside the test.
    #[must_use]
    pub fn with_log_level(mut self, log_level: impl Into<LogLevel>) -> Self {
        self.log_level = log_level.into();
        self
    }
}
