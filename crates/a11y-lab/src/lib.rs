//! a11y-lab: run accessibility experiments against a host page. Isolate the
//! page's content, perturb its presentation, and collect pass/fail verdicts.

pub mod config;
pub mod dom;
pub mod effects;
pub mod engine;
pub mod export;
pub mod html;
pub mod markup;
pub mod notify;
pub mod page;
pub mod types;
pub mod wrapper;

pub use config::{resolve, EffectiveConfig, ExperimentsInput, PropValue, Resolution};
pub use dom::{Document, NodeId};
pub use engine::{Command, EngineSnapshot, ExperimentEngine};
pub use export::{export, ExportFormat};
pub use markup::{inject, Injection};
pub use notify::{
    ManualScheduler, Notification, NotificationCenter, NotificationId, NotificationTiming,
    Scheduler, TimerEvent,
};
pub use page::{Page, WidgetProps};
pub use types::*;
pub use wrapper::{ContentWrapper, Wrapper};
