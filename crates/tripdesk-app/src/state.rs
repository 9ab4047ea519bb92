// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{
    NO_STATUS_LABEL, Principal, Selection, SortField, SortSpec, Trip, TripId, TripUpdate,
    TripUpdates, ValueFilter, ViewFilter, project_view, unique_projects, unique_statuses,
};

static NO_UPDATES: TripUpdates = TripUpdates::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Loaded(_) | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Pending,
    Authenticated(Principal),
    Unauthenticated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    SetSearch(String),
    SetProjectFilter(ValueFilter),
    SetStatusFilter(ValueFilter),
    SortBy(SortField),
    ToggleRow { index: usize, range: bool },
    SelectAllVisible,
    ClearVisible,
    ToggleExpanded(TripId),
    DismissNotices,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Blocked,
    FilterChanged,
    SortChanged(SortSpec),
    SelectionChanged { selected: usize },
    RowExpanded(TripId),
    RowCollapsed(TripId),
    AuthChanged,
    TripsChanged { count: usize },
    UpdatesChanged,
    Notified(Notice),
    NoticesCleared,
}

/// Client-side state for one dashboard view: what was loaded, how it is
/// filtered and sorted, and which rows are checked or expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripBoard {
    auth: AuthState,
    trips: LoadState<Vec<Trip>>,
    updates: LoadState<TripUpdates>,
    filter: ViewFilter,
    sort: SortSpec,
    selection: Selection,
    expanded: BTreeSet<TripId>,
    notices: Vec<Notice>,
}

impl Default for TripBoard {
    fn default() -> Self {
        Self {
            auth: AuthState::Pending,
            trips: LoadState::Idle,
            updates: LoadState::Idle,
            filter: ViewFilter::default(),
            sort: SortSpec::default(),
            selection: Selection::new(),
            expanded: BTreeSet::new(),
            notices: Vec::new(),
        }
    }
}

impl TripBoard {
    pub fn dispatch(&mut self, command: BoardCommand) -> Vec<BoardEvent> {
        if command == BoardCommand::DismissNotices {
            self.notices.clear();
            return vec![BoardEvent::NoticesCleared];
        }
        if !self.is_interactive() {
            return vec![BoardEvent::Blocked];
        }

        match command {
            BoardCommand::SetSearch(term) => {
                self.filter.search = term;
                vec![BoardEvent::FilterChanged]
            }
            BoardCommand::SetProjectFilter(project) => {
                self.filter.project = project;
                vec![BoardEvent::FilterChanged]
            }
            BoardCommand::SetStatusFilter(status) => {
                self.filter.status = status;
                vec![BoardEvent::FilterChanged]
            }
            BoardCommand::SortBy(field) => {
                self.sort.toggle(field);
                vec![BoardEvent::SortChanged(self.sort)]
            }
            BoardCommand::ToggleRow { index, range } => {
                let view = self.visible_ids();
                match self.selection.toggle(&view, index, range) {
                    Some(_) => vec![self.selection_changed()],
                    None => Vec::new(),
                }
            }
            BoardCommand::SelectAllVisible => {
                let view = self.visible_ids();
                self.selection.select_all(&view);
                vec![self.selection_changed()]
            }
            BoardCommand::ClearVisible => {
                let view = self.visible_ids();
                self.selection.clear_visible(&view);
                vec![self.selection_changed()]
            }
            BoardCommand::ToggleExpanded(trip_id) => {
                if self.expanded.remove(&trip_id) {
                    vec![BoardEvent::RowCollapsed(trip_id)]
                } else if self.contains(trip_id) {
                    self.expanded.insert(trip_id);
                    vec![BoardEvent::RowExpanded(trip_id)]
                } else {
                    Vec::new()
                }
            }
            BoardCommand::DismissNotices => Vec::new(),
        }
    }

    pub fn begin_auth(&mut self) {
        self.auth = AuthState::Pending;
    }

    pub fn auth_resolved(&mut self, result: Result<Principal, String>) -> Vec<BoardEvent> {
        match result {
            Ok(principal) => {
                self.auth = AuthState::Authenticated(principal);
                vec![BoardEvent::AuthChanged]
            }
            Err(reason) => {
                self.auth = AuthState::Unauthenticated(reason.clone());
                vec![
                    BoardEvent::AuthChanged,
                    self.notify(Notice::error(format!("authentication failed: {reason}"))),
                ]
            }
        }
    }

    /// A reload keeps the current list on screen until the response arrives.
    pub fn begin_trip_load(&mut self) {
        if !matches!(self.trips, LoadState::Loaded(_)) {
            self.trips = LoadState::Loading;
        }
    }

    pub fn trips_loaded(&mut self, result: Result<Vec<Trip>, String>) -> Vec<BoardEvent> {
        match result {
            Ok(trips) => {
                let count = trips.len();
                let existing: BTreeSet<TripId> = trips.iter().map(|trip| trip.id).collect();
                self.selection.retain_existing(&existing);
                self.expanded.retain(|id| existing.contains(id));
                self.trips = LoadState::Loaded(trips);
                vec![BoardEvent::TripsChanged { count }]
            }
            Err(reason) => {
                if !matches!(self.trips, LoadState::Loaded(_)) {
                    self.trips = LoadState::Failed(reason.clone());
                    self.selection.clear();
                    self.expanded.clear();
                }
                vec![self.notify(Notice::error(format!("could not load trips: {reason}")))]
            }
        }
    }

    pub fn begin_update_load(&mut self) {
        if !matches!(self.updates, LoadState::Loaded(_)) {
            self.updates = LoadState::Loading;
        }
    }

    pub fn updates_loaded(&mut self, result: Result<TripUpdates, String>) -> Vec<BoardEvent> {
        match result {
            Ok(updates) => {
                self.updates = LoadState::Loaded(updates);
                vec![BoardEvent::UpdatesChanged]
            }
            Err(reason) => {
                if !matches!(self.updates, LoadState::Loaded(_)) {
                    self.updates = LoadState::Failed(reason.clone());
                }
                vec![self.notify(Notice::error(format!("could not load updates: {reason}")))]
            }
        }
    }

    /// Replaces one trip's updates after a new one was posted.
    pub fn trip_updates_refreshed(
        &mut self,
        trip_id: TripId,
        updates: Vec<TripUpdate>,
    ) -> Vec<BoardEvent> {
        match &mut self.updates {
            LoadState::Loaded(all) => all.insert(trip_id, updates),
            _ => {
                let mut all = TripUpdates::new();
                all.insert(trip_id, updates);
                self.updates = LoadState::Loaded(all);
            }
        }
        vec![BoardEvent::UpdatesChanged]
    }

    pub fn update_failed(&mut self, reason: &str) -> Vec<BoardEvent> {
        vec![self.notify(Notice::error(format!("could not post update: {reason}")))]
    }

    pub fn upload_finished(&mut self, count: usize) -> Vec<BoardEvent> {
        vec![self.notify(Notice::success(count_label(count, "loaded")))]
    }

    pub fn upload_failed(&mut self, reason: &str) -> Vec<BoardEvent> {
        vec![self.notify(Notice::error(format!("upload failed: {reason}")))]
    }

    /// Drops deleted trips locally without refetching.
    pub fn trips_deleted(&mut self, trip_ids: &BTreeSet<TripId>) -> Vec<BoardEvent> {
        let mut removed = 0;
        if let LoadState::Loaded(trips) = &mut self.trips {
            let before = trips.len();
            trips.retain(|trip| !trip_ids.contains(&trip.id));
            removed = before - trips.len();
        }
        if let LoadState::Loaded(updates) = &mut self.updates {
            for trip_id in trip_ids {
                updates.remove(*trip_id);
            }
        }
        self.expanded.retain(|id| !trip_ids.contains(id));
        self.selection.remove(trip_ids);

        let count = self.trips().len();
        vec![
            BoardEvent::TripsChanged { count },
            self.selection_changed(),
            self.notify(Notice::success(count_label(removed, "deleted"))),
        ]
    }

    pub fn delete_failed(&mut self, reason: &str) -> Vec<BoardEvent> {
        vec![self.notify(Notice::error(format!("delete failed: {reason}")))]
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated(_))
    }

    /// False while sign-in or the first trip load is outstanding.
    pub fn is_interactive(&self) -> bool {
        self.is_authenticated() && self.trips.is_settled()
    }

    pub fn trip_state(&self) -> &LoadState<Vec<Trip>> {
        &self.trips
    }

    pub fn update_state(&self) -> &LoadState<TripUpdates> {
        &self.updates
    }

    pub fn trips(&self) -> &[Trip] {
        self.trips.loaded().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn updates(&self) -> &TripUpdates {
        self.updates.loaded().unwrap_or(&NO_UPDATES)
    }

    pub fn trip(&self, trip_id: TripId) -> Option<&Trip> {
        self.trips().iter().find(|trip| trip.id == trip_id)
    }

    pub fn contains(&self, trip_id: TripId) -> bool {
        self.trip(trip_id).is_some()
    }

    pub fn status_label(&self, trip_id: TripId) -> &str {
        self.updates().status_of(trip_id).unwrap_or(NO_STATUS_LABEL)
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_expanded(&self, trip_id: TripId) -> bool {
        self.expanded.contains(&trip_id)
    }

    pub fn visible_trips(&self) -> Vec<&Trip> {
        project_view(self.trips(), &self.filter, self.sort, self.updates())
    }

    pub fn visible_ids(&self) -> Vec<TripId> {
        self.visible_trips().iter().map(|trip| trip.id).collect()
    }

    pub fn projects(&self) -> Vec<String> {
        unique_projects(self.trips())
    }

    pub fn statuses(&self) -> Vec<String> {
        unique_statuses(self.updates())
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn selection_changed(&self) -> BoardEvent {
        BoardEvent::SelectionChanged {
            selected: self.selection.len(),
        }
    }

    fn notify(&mut self, notice: Notice) -> BoardEvent {
        self.notices.push(notice.clone());
        BoardEvent::Notified(notice)
    }
}

fn count_label(count: usize, verb: &str) -> String {
    if count == 1 {
        format!("1 trip {verb}")
    } else {
        format!("{count} trips {verb}")
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthState, BoardCommand, BoardEvent, LoadState, Notice, NoticeLevel, TripBoard};
    use crate::{
        Principal, SortDirection, SortField, Trip, TripId, TripUpdate, TripUpdateId,
        TripUpdates, ValueFilter,
    };
    use std::collections::BTreeSet;
    use time::macros::{date, datetime};

    fn trip(id: i64, project: &str, day: u8) -> Trip {
        Trip {
            id: TripId::new(id),
            system_trip_id: format!("T{id}"),
            external_trip_id: None,
            delivery_date: date!(2024 - 01 - 01).replace_day(day).expect("valid day"),
            driver_name: format!("Driver {id}"),
            origin: String::new(),
            destination: "Lima".to_owned(),
            project: project.to_owned(),
            plate_number: format!("PL{id}"),
            property_type: "Propio".to_owned(),
            work_shift: "Dia".to_owned(),
            created_at: datetime!(2024-01-01 00:00:00 UTC),
        }
    }

    fn principal() -> Principal {
        Principal {
            user_id: "u-1".to_owned(),
            email: "ops@example.com".to_owned(),
        }
    }

    fn loaded_board(trips: Vec<Trip>) -> TripBoard {
        let mut board = TripBoard::default();
        board.auth_resolved(Ok(principal()));
        board.begin_trip_load();
        board.trips_loaded(Ok(trips));
        board
    }

    fn selected(board: &TripBoard) -> Vec<i64> {
        board
            .selection()
            .selected()
            .iter()
            .map(|id| id.get())
            .collect()
    }

    #[test]
    fn commands_are_blocked_until_authenticated_and_loaded() {
        let mut board = TripBoard::default();
        assert!(!board.is_interactive());
        assert_eq!(
            board.dispatch(BoardCommand::SelectAllVisible),
            vec![BoardEvent::Blocked]
        );

        board.auth_resolved(Ok(principal()));
        board.begin_trip_load();
        assert!(board.trip_state().is_loading());
        assert_eq!(
            board.dispatch(BoardCommand::SortBy(SortField::Project)),
            vec![BoardEvent::Blocked]
        );

        board.trips_loaded(Ok(vec![trip(1, "Norte", 1)]));
        assert!(board.is_interactive());
    }

    #[test]
    fn failed_auth_is_terminal_and_notifies() {
        let mut board = TripBoard::default();
        let events = board.auth_resolved(Err("invalid login".to_owned()));
        assert_eq!(
            board.auth(),
            &AuthState::Unauthenticated("invalid login".to_owned())
        );
        assert_eq!(events.len(), 2);
        assert_eq!(board.notices()[0].level, NoticeLevel::Error);
        assert!(board.notices()[0].message.contains("invalid login"));
        assert!(!board.is_interactive());
    }

    #[test]
    fn failed_trip_load_leaves_empty_view() {
        let mut board = TripBoard::default();
        board.auth_resolved(Ok(principal()));
        board.begin_trip_load();
        board.trips_loaded(Err("timeout".to_owned()));
        assert_eq!(board.trip_state(), &LoadState::Failed("timeout".to_owned()));
        assert!(board.visible_trips().is_empty());
        assert_eq!(
            board.take_notices(),
            vec![Notice::error("could not load trips: timeout")]
        );
        assert!(board.notices().is_empty());
    }

    #[test]
    fn failed_reload_keeps_loaded_trips_and_selection() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1), trip(2, "Sur", 2)]);
        board.dispatch(BoardCommand::SelectAllVisible);
        board.dispatch(BoardCommand::ToggleExpanded(TripId::new(2)));

        board.begin_trip_load();
        assert!(board.is_interactive());
        board.trips_loaded(Err("timeout".to_owned()));

        assert_eq!(board.trips().len(), 2);
        assert_eq!(selected(&board), vec![1, 2]);
        assert!(board.is_expanded(TripId::new(2)));
        assert_eq!(
            board.take_notices(),
            vec![Notice::error("could not load trips: timeout")]
        );
    }

    #[test]
    fn failed_reload_keeps_loaded_updates() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1)]);
        board.begin_update_load();
        let mut updates = TripUpdates::new();
        updates.insert(
            TripId::new(1),
            vec![TripUpdate {
                id: TripUpdateId::new(9),
                trip_id: TripId::new(1),
                category: "en ruta".to_owned(),
                notes: String::new(),
                created_at: datetime!(2024-01-02 10:00:00 UTC),
            }],
        );
        board.updates_loaded(Ok(updates));

        board.begin_update_load();
        board.updates_loaded(Err("timeout".to_owned()));
        assert_eq!(board.status_label(TripId::new(1)), "en ruta");
        assert_eq!(board.notices().len(), 1);
    }

    #[test]
    fn select_all_under_filter_selects_visible_subset() {
        let mut board = loaded_board(vec![
            trip(1, "Norte", 1),
            trip(2, "Sur", 2),
            trip(3, "Norte", 3),
        ]);
        board.dispatch(BoardCommand::SetProjectFilter(ValueFilter::Only(
            "Norte".to_owned(),
        )));
        let events = board.dispatch(BoardCommand::SelectAllVisible);
        assert_eq!(events, vec![BoardEvent::SelectionChanged { selected: 2 }]);
        assert_eq!(selected(&board), vec![1, 3]);
    }

    #[test]
    fn shift_toggle_uses_sorted_view_order() {
        let mut board = loaded_board(vec![
            trip(1, "Norte", 4),
            trip(2, "Norte", 1),
            trip(3, "Norte", 3),
            trip(4, "Norte", 2),
            trip(5, "Norte", 5),
        ]);
        board.dispatch(BoardCommand::SortBy(SortField::DeliveryDate));
        assert_eq!(board.sort().direction, SortDirection::Asc);
        assert_eq!(
            board.visible_ids(),
            vec![2, 4, 3, 1, 5]
                .into_iter()
                .map(TripId::new)
                .collect::<Vec<_>>()
        );

        board.dispatch(BoardCommand::ToggleRow {
            index: 0,
            range: false,
        });
        board.dispatch(BoardCommand::ToggleRow {
            index: 3,
            range: true,
        });
        assert_eq!(selected(&board), vec![1, 2, 3, 4]);
    }

    #[test]
    fn delete_prunes_trips_updates_selection_and_expansion() {
        let mut board = loaded_board(vec![
            trip(1, "Norte", 1),
            trip(2, "Sur", 2),
            trip(3, "Norte", 3),
        ]);
        let updates: TripUpdates = [(
            TripId::new(2),
            vec![TripUpdate {
                id: TripUpdateId::new(1),
                trip_id: TripId::new(2),
                category: "en ruta".to_owned(),
                notes: String::new(),
                created_at: datetime!(2024-01-02 08:00:00 UTC),
            }],
        )]
        .into_iter()
        .collect();
        board.updates_loaded(Ok(updates));
        board.dispatch(BoardCommand::SelectAllVisible);
        board.dispatch(BoardCommand::ToggleExpanded(TripId::new(2)));
        assert!(board.is_expanded(TripId::new(2)));

        let doomed: BTreeSet<TripId> = [TripId::new(2), TripId::new(3)].into_iter().collect();
        let events = board.trips_deleted(&doomed);

        assert_eq!(events[0], BoardEvent::TripsChanged { count: 1 });
        assert_eq!(selected(&board), vec![1]);
        assert!(!board.is_expanded(TripId::new(2)));
        assert!(board.updates().for_trip(TripId::new(2)).is_empty());
        assert_eq!(
            board.notices().last(),
            Some(&Notice::success("2 trips deleted"))
        );
    }

    #[test]
    fn single_delete_notice_is_singular() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1), trip(2, "Sur", 2)]);
        let doomed: BTreeSet<TripId> = [TripId::new(1)].into_iter().collect();
        board.trips_deleted(&doomed);
        assert_eq!(
            board.notices().last(),
            Some(&Notice::success("1 trip deleted"))
        );
    }

    #[test]
    fn failed_delete_keeps_local_state() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1)]);
        board.dispatch(BoardCommand::SelectAllVisible);
        board.delete_failed("permission denied");
        assert_eq!(board.trips().len(), 1);
        assert_eq!(selected(&board), vec![1]);
        assert_eq!(
            board.notices().last(),
            Some(&Notice::error("delete failed: permission denied"))
        );
    }

    #[test]
    fn reload_prunes_selection_to_existing_trips() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1), trip(2, "Sur", 2)]);
        board.dispatch(BoardCommand::SelectAllVisible);
        board.trips_loaded(Ok(vec![trip(2, "Sur", 2)]));
        assert_eq!(selected(&board), vec![2]);
    }

    #[test]
    fn status_label_falls_back_without_updates() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1)]);
        assert_eq!(board.status_label(TripId::new(1)), "sin estado");

        board.trip_updates_refreshed(
            TripId::new(1),
            vec![TripUpdate {
                id: TripUpdateId::new(7),
                trip_id: TripId::new(1),
                category: "entregado".to_owned(),
                notes: String::new(),
                created_at: datetime!(2024-01-03 08:00:00 UTC),
            }],
        );
        assert_eq!(board.status_label(TripId::new(1)), "entregado");
        assert_eq!(board.statuses(), vec!["all", "entregado"]);
    }

    #[test]
    fn expanding_unknown_trip_is_ignored() {
        let mut board = loaded_board(vec![trip(1, "Norte", 1)]);
        assert!(
            board
                .dispatch(BoardCommand::ToggleExpanded(TripId::new(99)))
                .is_empty()
        );
        assert_eq!(
            board.dispatch(BoardCommand::ToggleExpanded(TripId::new(1))),
            vec![BoardEvent::RowExpanded(TripId::new(1))]
        );
        assert_eq!(
            board.dispatch(BoardCommand::ToggleExpanded(TripId::new(1))),
            vec![BoardEvent::RowCollapsed(TripId::new(1))]
        );
    }

    #[test]
    fn dismiss_works_even_when_blocked() {
        let mut board = TripBoard::default();
        board.auth_resolved(Err("nope".to_owned()));
        assert_eq!(
            board.dispatch(BoardCommand::DismissNotices),
            vec![BoardEvent::NoticesCleared]
        );
        assert!(board.notices().is_empty());
    }

    #[test]
    fn upload_notice_reports_count() {
        let mut board = loaded_board(Vec::new());
        board.upload_finished(12);
        assert_eq!(
            board.notices().last(),
            Some(&Notice::success("12 trips loaded"))
        );
    }
}
