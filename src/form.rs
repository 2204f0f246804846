use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::CredentialMode;

/// Visibility of the credential controls and whether they allow submitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialLayout {
    pub login_section_visible: bool,
    pub manual_section_visible: bool,
    pub login_visible: bool,
    pub logout_visible: bool,
    pub submit_ready: bool,
}

impl CredentialLayout {
    /// Pure function of its inputs, so switching modes back and forth always
    /// lands on the same layout.
    pub fn derive(mode: CredentialMode, logged_in: bool, manual_present: bool) -> Self {
        let session_based = mode == CredentialMode::SessionBased;
        Self {
            login_section_visible: session_based,
            manual_section_visible: !session_based,
            login_visible: !logged_in,
            logout_visible: logged_in,
            submit_ready: if session_based { logged_in } else { manual_present },
        }
    }
}

/// What the view should display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSnapshot {
    /// False while a submission is in flight
    pub controls_enabled: bool,
    pub submit_enabled: bool,
    pub layout: CredentialLayout,
}

pub trait FormView: Send + Sync {
    fn render_form(&self, snapshot: &FormSnapshot);
}

/// View for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFormView;

impl FormView for NoopFormView {
    fn render_form(&self, _snapshot: &FormSnapshot) {}
}

/// Enables and disables the form so that at most one submission is in
/// flight. Locking hands out a [`FormLock`]; dropping it unlocks.
pub struct FormController {
    locked: AtomicBool,
    layout: Mutex<CredentialLayout>,
    view: Arc<dyn FormView>,
}

impl FormController {
    pub fn new(view: Arc<dyn FormView>) -> Self {
        Self {
            locked: AtomicBool::new(false),
            layout: Mutex::new(CredentialLayout::default()),
            view,
        }
    }

    /// Disable every control. `None` when a submission already holds the lock.
    pub fn lock(&self) -> Option<FormLock<'_>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Form already locked");
            return None;
        }

        self.render();
        Some(FormLock { form: self })
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
        self.render();
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Replace the credential layout. Leaves the lock alone.
    pub fn set_layout(&self, layout: CredentialLayout) {
        let changed = {
            let mut current = self.layout_guard();
            let changed = *current != layout;
            *current = layout;
            changed
        };
        if changed {
            self.render();
        }
    }

    pub fn layout(&self) -> CredentialLayout {
        *self.layout_guard()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let layout = self.layout();
        let controls_enabled = !self.is_locked();
        FormSnapshot {
            controls_enabled,
            submit_enabled: controls_enabled && layout.submit_ready,
            layout,
        }
    }

    pub fn can_submit(&self) -> bool {
        self.snapshot().submit_enabled
    }

    fn layout_guard(&self) -> MutexGuard<'_, CredentialLayout> {
        self.layout.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn render(&self) {
        self.view.render_form(&self.snapshot());
    }
}

/// Held for the duration of one submission attempt
#[must_use = "the form unlocks as soon as the lock is dropped"]
pub struct FormLock<'a> {
    form: &'a FormController,
}

impl FormLock<'_> {
    pub fn unlock(self) {}
}

impl Drop for FormLock<'_> {
    fn drop(&mut self) {
        self.form.unlock();
    }
}
