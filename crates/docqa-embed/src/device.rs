use candle_core::Device;
use tracing::{debug, info};

/// Device the embedding model runs on. GPU only when built with `metal`
/// and a Metal device is present; everything else falls back to CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!(backend = "metal", ordinal = 0, "embedding device selected");
                return dev;
            }
            Err(e) => debug!(error = %e, "metal unavailable"),
        }
    }
    #[cfg(not(feature = "metal"))]
    {
        debug!("built without metal support");
    }
    info!(backend = "cpu", "embedding device selected");
    Device::Cpu
}

#[cfg(all(test, not(feature = "metal")))]
mod tests {
    use super::*;

    #[test]
    fn cpu_without_gpu_backends() {
        assert!(matches!(select_device(), Device::Cpu));
    }
}
