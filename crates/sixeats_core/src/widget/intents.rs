//! User-facing actions invoked by the host app and widget buttons.
//!
//! Each action performs its store work first, then asks the host platform
//! to re-render widget timelines. Reload requests are fire-and-forget.

use crate::clock::Clock;
use crate::model::meal::MealValidationError;
use crate::repo::defaults_repo::SharedDefaults;
use crate::service::meal_store::{MealStateStore, ToggleOutcome};
use log::{info, warn};

/// Widget kind passed to every reload request.
pub const WIDGET_KIND: &str = "SixEatsWidget";

/// Host platform hook that invalidates scheduled widget timelines.
pub trait TimelineReloader {
    fn reload_timelines(&self, kind: &str);
}

impl<R: TimelineReloader + ?Sized> TimelineReloader for &R {
    fn reload_timelines(&self, kind: &str) {
        (**self).reload_timelines(kind)
    }
}

/// Toggles `label` and requests an immediate widget reload.
///
/// Rejected labels leave storage untouched and request no reload.
pub fn toggle_meal_intent<D, C, R>(
    store: &MealStateStore<D, C>,
    reloader: &R,
    label: &str,
) -> Result<ToggleOutcome, MealValidationError>
where
    D: SharedDefaults,
    C: Clock,
    R: TimelineReloader + ?Sized,
{
    let outcome = store.toggle_meal(label).inspect_err(|err| {
        warn!(
            "event=toggle_intent module=widget status=rejected error={}",
            err
        );
    })?;

    reloader.reload_timelines(WIDGET_KIND);
    Ok(outcome)
}

/// Widget refresh button: reload only.
pub fn refresh_intent<R: TimelineReloader + ?Sized>(reloader: &R) {
    info!("event=refresh_intent module=widget status=ok");
    reloader.reload_timelines(WIDGET_KIND);
}

/// Host app entered the foreground.
pub fn app_became_active<R: TimelineReloader + ?Sized>(reloader: &R) {
    info!("event=app_active module=widget status=ok");
    reloader.reload_timelines(WIDGET_KIND);
}
