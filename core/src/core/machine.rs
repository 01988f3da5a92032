/// Describes a single input the host can feed into a machine: a keyboard
/// matrix key, a joystick button, or a break/reset line.
pub struct InputButton {
    /// Machine-defined identifier, passed back to `set_input()`.
    pub id: u8,
    /// Human-readable name for display/configuration (e.g., "SHIFT", "BREAK").
    pub name: &'static str,
}

/// Machine-agnostic interface for emulated systems.
///
/// A concrete machine (e.g. a BBC Model B) implements this so the frontend
/// can drive it without knowing about VIAs, CRTCs, or memory maps.
pub trait Machine {
    /// Native display resolution as (width, height) in pixels.
    fn display_size(&self) -> (u32, u32);

    /// Run one video frame's worth of emulation.
    fn run_frame(&mut self);

    /// Render the current video state into an RGB24 pixel buffer.
    ///
    /// The buffer must be at least `width * height * 3` bytes (from
    /// `display_size()`). Pixels are left-to-right, top-to-bottom, 3 bytes
    /// per pixel (R, G, B).
    fn render_frame(&self, buffer: &mut [u8]);

    /// Handle an input event. `button` is a machine-defined ID from
    /// `input_map()`. `pressed` is true for key-down, false for key-up.
    fn set_input(&mut self, button: u8, pressed: bool);

    /// The list of inputs this machine accepts.
    fn input_map(&self) -> &[InputButton];

    /// Reset the machine to its initial power-on state.
    fn reset(&mut self);

    /// Snapshot battery-backed/persistent state (RTC CMOS RAM) for saving
    /// across sessions. Returns an empty vec on machines with none.
    fn save_nvram(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Restore battery-backed state previously returned by `save_nvram()`.
    /// A no-op on machines with none.
    fn load_nvram(&mut self, _data: &[u8]) {}
}
