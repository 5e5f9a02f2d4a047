//! Controllers and middleware shipped with the crate.
//!
//! | name             | kind       | parameters                          |
//! |------------------|------------|-------------------------------------|
//! | `status`         | controller | action `show`                       |
//! | `echo`           | controller | action `show`                       |
//! | `throttle`       | middleware | `max_requests`, `per_seconds` (60)  |
//! | `require_header` | middleware | `header`                            |
//! | `set_header`     | middleware | `name`, `value`                     |

pub mod controllers;
pub mod headers;
pub mod throttle;

use std::sync::Arc;

use crate::dispatch::resolver::Container;

pub use controllers::{echo_controller, status_controller};
pub use headers::{RequireHeader, SetHeader};
pub use throttle::{Throttle, ThrottleState};

/// Bind every built-in under its conventional name.
pub fn register(container: &mut Container) -> &mut Container {
    let throttle_state = Arc::new(ThrottleState::new());

    container
        .bind_controller("status", status_controller)
        .bind_controller("echo", echo_controller)
        .bind_middleware("throttle", move |params| {
            Throttle::from_params(throttle_state.clone(), params)
        })
        .bind_middleware("require_header", RequireHeader::from_params)
        .bind_middleware("set_header", SetHeader::from_params)
}
