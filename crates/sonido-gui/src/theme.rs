//! Visual styling for the Sonido GUI.
//!
//! Re-exports from [`sonido_gui_core::theme`] — the canonical theme
//! definition lives in `sonido-gui-core` so it can be shared with
//! plugin UIs.

pub use sonido_gui_core::Theme;
