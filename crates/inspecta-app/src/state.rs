// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, FormKind, Role, TabKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub role: Option<Role>,
    pub active_tab: TabKind,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Login,
            role: None,
            active_tab: TabKind::Appointments,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SignedIn(Role),
    SignedOut,
    SessionExpired,
    NextTab,
    PrevTab,
    SelectTab(TabKind),
    OpenForm(FormKind),
    OpenInspection,
    ExitToNav,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn tabs(&self) -> &'static [TabKind] {
        match self.role {
            Some(role) => TabKind::for_role(role),
            None => &[],
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SignedIn(role) => {
                self.role = Some(role);
                self.mode = AppMode::Nav;
                self.active_tab = TabKind::Appointments;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    AppEvent::TabChanged(self.active_tab),
                    self.set_status(&format!("signed in as {}", role.label())),
                ]
            }
            AppCommand::SignedOut => {
                *self = Self::default();
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status("signed out"),
                ]
            }
            AppCommand::SessionExpired => {
                *self = Self::default();
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status("session expired -- sign in again"),
                ]
            }
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(tab) => {
                if !self.tabs().contains(&tab) || self.active_tab == tab {
                    return Vec::new();
                }
                self.active_tab = tab;
                vec![AppEvent::TabChanged(tab)]
            }
            AppCommand::OpenForm(kind) => self.enter(AppMode::Form(kind)),
            AppCommand::OpenInspection => self.enter(AppMode::Inspection),
            AppCommand::ExitToNav => {
                if self.role.is_none() {
                    return Vec::new();
                }
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn enter(&mut self, mode: AppMode) -> Vec<AppEvent> {
        if self.mode != AppMode::Nav {
            return Vec::new();
        }
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = self.tabs();
        if tabs.is_empty() || self.mode != AppMode::Nav {
            return Vec::new();
        }
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{AppMode, FormKind, Role, TabKind};

    fn signed_in(role: Role) -> AppState {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SignedIn(role));
        state
    }

    #[test]
    fn tab_rotation_wraps_within_role_tabs() {
        let mut state = signed_in(Role::Inspector);
        state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Schedule);

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Appointments);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Appointments)]);
    }

    #[test]
    fn users_tab_is_admin_only() {
        let mut agent = signed_in(Role::CallCenter);
        assert!(agent.dispatch(AppCommand::SelectTab(TabKind::Users)).is_empty());

        let mut admin = signed_in(Role::Admin);
        admin.dispatch(AppCommand::PrevTab);
        assert_eq!(admin.active_tab, TabKind::Users);
    }

    #[test]
    fn login_screen_ignores_navigation() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::NextTab).is_empty());
        assert!(state.dispatch(AppCommand::ExitToNav).is_empty());
        assert_eq!(state.mode, AppMode::Login);
    }

    #[test]
    fn mode_transitions() {
        let mut state = signed_in(Role::Admin);

        state.dispatch(AppCommand::OpenForm(FormKind::Task));
        assert_eq!(state.mode, AppMode::Form(FormKind::Task));
        assert!(state.dispatch(AppCommand::OpenInspection).is_empty());

        state.dispatch(AppCommand::ExitToNav);
        state.dispatch(AppCommand::OpenInspection);
        assert_eq!(state.mode, AppMode::Inspection);
    }

    #[test]
    fn session_expiry_resets_everything() {
        let mut state = signed_in(Role::Admin);
        state.dispatch(AppCommand::SelectTab(TabKind::Users));

        let events = state.dispatch(AppCommand::SessionExpired);
        assert_eq!(state.mode, AppMode::Login);
        assert_eq!(state.role, None);
        assert_eq!(state.active_tab, TabKind::Appointments);
        assert_eq!(
            events,
            vec![
                AppEvent::ModeChanged(AppMode::Login),
                AppEvent::StatusUpdated("session expired -- sign in again".to_owned()),
            ]
        );
    }
}
