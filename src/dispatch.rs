//! Action dispatcher
//!
//! The one place view state mutates. Both transport-delivered actions and
//! locally originated ones (UI clicks, scenario steps) funnel through
//! `dispatch`, so filter, history and insight can never drift apart no
//! matter which side initiated the change.

use tracing::{debug, info};

use crate::data::Dataset;
use crate::filter::FilterState;
use crate::message::{AgentAction, ComparisonRequest};
use crate::state::ViewState;
use crate::summary::derive_insight;

/// What a dispatched action did
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Filter and history changed; derived state was recomputed
    Applied,
    /// A comparison was requested; view state is untouched
    Compare(ComparisonRequest),
    /// Recognized action with nothing to do (undo at the floor)
    NoChange,
}

/// Apply one action to the view state
///
/// `set_filter` and `clear_filters` always push a history entry, even when
/// the resulting state equals the current one. Undo below the floor is a
/// no-op rather than an error.
pub fn dispatch(view: &mut ViewState, dataset: &Dataset, action: AgentAction) -> DispatchOutcome {
    match action {
        AgentAction::SetFilter(patch) => {
            let next = view.filter.apply(&patch);
            info!("Filter set: {}", next);
            apply_state(view, dataset, next);
            DispatchOutcome::Applied
        }
        AgentAction::ClearFilters => {
            info!("Filters cleared");
            apply_state(view, dataset, FilterState::empty());
            DispatchOutcome::Applied
        }
        AgentAction::Undo => {
            if !view.history.can_undo() {
                debug!("Undo ignored, already at initial state");
                return DispatchOutcome::NoChange;
            }
            let restored = view.history.undo();
            info!("Undo restored: {}", restored);
            view.insight = derive_insight(dataset.records(), &restored);
            view.filter = restored;
            DispatchOutcome::Applied
        }
        AgentAction::Compare(request) => {
            info!(
                "Comparison requested: {} vs {} by {}",
                request.item1,
                request.item2,
                request.kind.as_str()
            );
            DispatchOutcome::Compare(request)
        }
    }
}

fn apply_state(view: &mut ViewState, dataset: &Dataset, next: FilterState) {
    view.insight = derive_insight(dataset.records(), &next);
    view.history.push(next.clone());
    view.filter = next;
}
