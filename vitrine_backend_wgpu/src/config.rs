// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

/// Device selection and readback parameters.
#[derive(Clone, Debug)]
pub struct WgpuBackendConfig {
    /// Backends the instance may pick from.
    pub backends: wgpu::Backends,

    /// Adapter preference.
    ///
    /// Captures are short bursts; the integrated GPU is usually enough.
    pub power_preference: wgpu::PowerPreference,

    /// Request a software adapter.
    pub force_fallback_adapter: bool,

    /// Limits requested from the device.
    pub required_limits: wgpu::Limits,

    /// Longest wait for a staging buffer to map before the readback fails.
    pub readback_timeout: Duration,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            required_limits: wgpu::Limits::downlevel_defaults(),
            readback_timeout: Duration::from_secs(2),
        }
    }
}
