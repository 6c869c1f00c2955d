//! # Logging helpers.

pub(crate) trait LogExt<T> {
    /// Emits a warning if the receiver contained an Err value.
    ///
    /// Returns an [`Option<T>`] with the `Ok(_)` value, if any.
    ///
    /// Thanks to `#[track_caller]` the location of the caller is printed to the log,
    /// not the location of this function.
    #[track_caller]
    fn log_err(self, msg: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogExt<T> for Result<T, E> {
    #[track_caller]
    fn log_err(self, msg: &str) -> Option<T> {
        match self {
            Err(e) => {
                let location = std::panic::Location::caller();
                // {:#} shows the whole chain of anyhow errors.
                log::warn!(
                    "{file}:{line}: {msg}: {e:#}",
                    file = location.file(),
                    line = location.line(),
                );
                None
            }
            Ok(v) => Some(v),
        }
    }
}
