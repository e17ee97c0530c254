// SPDX-License-Identifier: GPL-3.0-only

//! Scan session control
//!
//! ```text
//!  caller threads            scan-loop thread              frame-decoder thread
//!  ──────────────            ────────────────              ────────────────────
//!  ScanHandler::set_*  ──▶  ActionQueue ─▶ ScanLoop ──▶  FrameHandler ─▶ FrameDecoder
//!                                  ▲          │                 │
//!                                  │          ├─ render (camera + mask)
//!                                  │          └─ FocusSchedule ─▶ Camera::auto_focus
//!                                  └──────── results / focus completions
//! ```

pub mod action_queue;
pub mod callback;
pub mod focus;
pub mod handler;
pub mod mask;

pub use action_queue::{ActionQueue, SessionState};
pub use callback::{NoopCallback, ScanCallback};
pub use focus::FocusSchedule;
pub use handler::ScanHandler;
pub use mask::MaskBackground;
