//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Role-scoped dashboard controller.

pub mod action;
pub mod controller;
pub mod error;
pub mod feed;
pub mod kind;
pub mod widget;

pub use action::{DashboardAction, Severity};
pub use controller::{DashboardController, DashboardSnapshot};
pub use error::DashboardError;
pub use feed::NotificationFeed;
pub use kind::DashboardKind;
pub use widget::{RefreshSummary, Widget, WidgetHandle, WidgetMap};
