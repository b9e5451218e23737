//! Shader stage compilation, program linking and uniform binding.
//!
//! Stages and programs are owned handles over driver objects. They must be
//! handed back to the driver (`release`); dropping one unreleased logs a leak.

mod program;
mod stage;
mod uniform;

pub use program::Program;
pub use stage::ShaderStage;
pub use uniform::{Slot, UniformBinder};

/// Fetches a driver info log: probe the length, allocate exactly that much,
/// copy the text out.
pub(crate) fn read_info_log(len: usize, fetch: impl FnOnce(&mut [u8]) -> usize) -> String {
    let mut buf = vec![0u8; len];
    let written = fetch(&mut buf);
    buf.truncate(written);
    String::from_utf8_lossy(&buf).trim_end_matches('\0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_log_is_truncated_to_written_bytes() {
        let log = read_info_log(8, |buf| {
            buf[..3].copy_from_slice(b"bad");
            3
        });
        assert_eq!(log, "bad");
    }

    #[test]
    fn info_log_drops_trailing_nul() {
        let log = read_info_log(4, |buf| {
            buf.copy_from_slice(b"err\0");
            4
        });
        assert_eq!(log, "err");
    }
}
