// ── Group lifecycle ──
//
// `GroupController` drives create / read / update / delete / import for one
// named group. It holds no state of its own: every call takes the previous
// `GroupState` and the declared input and returns the next `GroupState`.
// Device calls are awaited one at a time, in a fixed order.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::binding::{self, BindingReport};
use crate::conflict;
use crate::device::FilterDevice;
use crate::diff::diff;
use crate::error::CoreError;
use crate::identity::GroupId;
use crate::model::{
    ApplyBinding, DEFAULT_SEQUENCE_STEP, FilterTable, GroupDecl, GroupState, RealizedEntry,
    RulePayload, SequencingMode,
};
use crate::sequence::{assign, auto_numbers, check_unique, validate_range};
use crate::sync::sync;

/// Lifecycle knobs.
#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    /// List the router's table before writing and refuse foreign numbers.
    pub preflight_collisions: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            preflight_collisions: true,
        }
    }
}

/// Request to adopt existing router entries as a managed group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub id: GroupId,
    /// Candidate numbers to probe, in entry order.
    pub numbers: Vec<u32>,
    pub start: Option<u32>,
    pub step: Option<u32>,
}

/// Validate a declaration and compute the state it describes, without
/// touching the device.
///
/// Checks, in order: rule family, payloads, numbering, range, duplicates,
/// binding ranges, and binding conflicts within the group.
pub fn realize<P: RulePayload>(decl: &GroupDecl<P>) -> Result<GroupState<P>, CoreError> {
    let id = decl.id();
    if decl.entries.is_empty() {
        return Err(CoreError::EmptyGroup {
            group: id.to_string(),
        });
    }
    if !P::supports(decl.table) {
        return Err(CoreError::UnsupportedTable { table: decl.table });
    }
    for (index, entry) in decl.entries.iter().enumerate() {
        entry
            .rule
            .validate()
            .map_err(|reason| CoreError::InvalidRule { index, reason })?;
    }

    let numbers = assign(&decl.entries, &decl.mode)?;
    validate_range(decl.table, &numbers)?;
    check_unique(&numbers)?;

    binding::validate_filter_ids(decl.table, &decl.bindings)?;
    let owner = id.to_string();
    binding::check_conflicts(
        decl.table,
        decl.bindings.iter().map(|b| (owner.as_str(), b)),
    )?;

    let entries = numbers
        .into_iter()
        .zip(&decl.entries)
        .map(|(number, entry)| RealizedEntry {
            number,
            rule: entry.rule.clone(),
        })
        .collect();

    Ok(GroupState {
        name: decl.name.clone(),
        table: decl.table,
        mode: decl.mode,
        entries,
        bindings: decl.bindings.clone(),
    })
}

/// Whether two binding sets resolve to the same slot lists.
pub fn bindings_differ(
    old: &[ApplyBinding],
    old_fallback: &[u32],
    new: &[ApplyBinding],
    new_fallback: &[u32],
) -> bool {
    binding::resolve_all(old, old_fallback) != binding::resolve_all(new, new_fallback)
}

/// Drives lifecycle operations for groups on one device.
pub struct GroupController<'d, D> {
    device: &'d D,
    options: ControllerOptions,
}

impl<'d, D: FilterDevice> GroupController<'d, D> {
    pub fn new(device: &'d D, options: ControllerOptions) -> Self {
        Self { device, options }
    }

    pub fn device(&self) -> &'d D {
        self.device
    }

    async fn preflight(
        &self,
        table: FilterTable,
        planned: &[u32],
        owned: &BTreeSet<u32>,
    ) -> Result<(), CoreError> {
        if self.options.preflight_collisions {
            conflict::preflight(self.device, table, planned, owned).await
        } else {
            Ok(())
        }
    }

    /// Create a group that does not exist yet.
    pub async fn create(
        &self,
        decl: &GroupDecl<D::Payload>,
    ) -> Result<GroupState<D::Payload>, CoreError> {
        let state = realize(decl)?;
        let numbers = state.numbers();
        let group = state.id();
        self.preflight(state.table, &numbers, &BTreeSet::new())
            .await?;

        debug!(group = %group, ?numbers, "creating group");
        let plan = diff(&BTreeSet::new(), &numbers);
        sync(self.device, state.table, &plan, &state.entries).await?;
        binding::reconcile(self.device, state.table, &[], &state.bindings, &numbers).await?;

        info!(group = %group, entries = numbers.len(), "group created");
        Ok(state)
    }

    /// Refresh a group from the router.
    ///
    /// Returns `None` when none of the group's numbers exist any more.
    pub async fn read(
        &self,
        prior: &GroupState<D::Payload>,
    ) -> Result<Option<GroupState<D::Payload>>, CoreError> {
        let group = prior.id();
        let mut entries = Vec::with_capacity(prior.entries.len());
        for number in prior.numbers() {
            match self.device.get_entry(prior.table, number).await {
                Ok(rule) => entries.push(RealizedEntry { number, rule }),
                Err(err) if err.is_not_found() => {
                    debug!(group = %group, table = %prior.table, number, "filter missing on router");
                }
                Err(err) => {
                    return Err(CoreError::device(
                        format!("read {} filter {number}", prior.table),
                        err,
                    ));
                }
            }
        }
        if entries.is_empty() {
            info!(group = %group, "no filters remain, group is absent");
            return Ok(None);
        }

        let current: Vec<u32> = entries.iter().map(|e| e.number).collect();
        let mut bindings = Vec::with_capacity(prior.bindings.len());
        for declared in &prior.bindings {
            match self
                .device
                .list_interface_filters(prior.table, &declared.interface, declared.direction)
                .await
            {
                Ok(bound) if bound.is_empty() => {
                    debug!(group = %group, interface = %declared.interface, direction = %declared.direction, "binding no longer present");
                }
                Ok(bound) => bindings.push(refresh_binding(declared, bound, &current)),
                Err(err) => {
                    warn!(group = %group, interface = %declared.interface, direction = %declared.direction, error = %err, "cannot read binding, keeping recorded value");
                    bindings.push(declared.clone());
                }
            }
        }

        Ok(Some(GroupState {
            name: prior.name.clone(),
            table: prior.table,
            mode: prior.mode,
            entries,
            bindings,
        }))
    }

    /// Move an existing group to a new declaration.
    pub async fn update(
        &self,
        prior: &GroupState<D::Payload>,
        decl: &GroupDecl<D::Payload>,
    ) -> Result<GroupState<D::Payload>, CoreError> {
        let group = prior.id();
        if decl.id() != group {
            return Err(CoreError::InvalidIdentity {
                input: decl.id().to_string(),
                reason: format!("cannot update {group} from a different group's declaration"),
            });
        }
        if !prior.mode.same_variant(&decl.mode) {
            return Err(CoreError::ModeChange {
                group: group.to_string(),
                from: prior.mode.to_string(),
                to: decl.mode.to_string(),
            });
        }

        let state = realize(decl)?;
        let numbers = state.numbers();
        let owned = prior.number_set();
        self.preflight(state.table, &numbers, &owned).await?;

        let plan = diff(&owned, &numbers);
        debug!(group = %group, delete = ?plan.to_delete, upsert = ?plan.to_upsert, "updating group");
        sync(self.device, state.table, &plan, &state.entries).await?;

        if bindings_differ(&prior.bindings, &prior.numbers(), &state.bindings, &numbers) {
            binding::reconcile(
                self.device,
                state.table,
                &prior.bindings,
                &state.bindings,
                &numbers,
            )
            .await?;
        } else {
            debug!(group = %group, "bindings unchanged");
        }

        info!(group = %group, entries = numbers.len(), removed = plan.to_delete.len(), "group updated");
        Ok(state)
    }

    /// Remove a group: unbind every binding first, then delete its entries.
    ///
    /// If any unbind fails no entry is deleted, so interfaces never point at
    /// numbers that no longer exist.
    pub async fn delete(&self, prior: &GroupState<D::Payload>) -> Result<(), CoreError> {
        let group = prior.id();
        let BindingReport { unbound, .. } =
            binding::unbind_all(self.device, prior.table, &prior.bindings).await?;
        debug!(group = %group, unbound = unbound.len(), "bindings removed");

        let plan = diff(&prior.number_set(), &[]);
        let report = sync(self.device, prior.table, &plan, &[]).await?;
        info!(
            group = %group,
            deleted = report.deleted.len(),
            already_absent = report.already_absent.len(),
            "group deleted"
        );
        Ok(())
    }

    /// Adopt existing router entries as a managed group.
    pub async fn import(
        &self,
        request: &ImportRequest,
    ) -> Result<GroupState<D::Payload>, CoreError> {
        let group = request.id.to_string();
        if request.numbers.is_empty() {
            return Err(CoreError::InvalidIdentity {
                input: group,
                reason: "at least one filter number is required".into(),
            });
        }
        if !D::Payload::supports(request.id.table) {
            return Err(CoreError::UnsupportedTable {
                table: request.id.table,
            });
        }
        validate_range(request.id.table, &request.numbers)?;
        check_unique(&request.numbers)?;

        let mut entries = Vec::new();
        for &number in &request.numbers {
            match self.device.get_entry(request.id.table, number).await {
                Ok(rule) => entries.push(RealizedEntry { number, rule }),
                Err(err) if err.is_not_found() => {
                    debug!(group = %group, number, "import candidate not on router, skipping");
                }
                Err(err) => {
                    return Err(CoreError::device(
                        format!("read {} filter {number}", request.id.table),
                        err,
                    ));
                }
            }
        }
        if entries.is_empty() {
            return Err(CoreError::ImportEmpty {
                group,
                probed: request.numbers.clone(),
            });
        }

        let mode = match request.start {
            Some(start) => {
                let step = request.step.unwrap_or(DEFAULT_SEQUENCE_STEP);
                let mode = SequencingMode::Auto { start, step };
                let found: Vec<u32> = entries.iter().map(|e| e.number).collect();
                let expected = auto_numbers(start, step, found.len())?;
                if expected != found {
                    return Err(CoreError::ImportMismatch {
                        group,
                        expected,
                        found,
                    });
                }
                mode
            }
            None => SequencingMode::Manual,
        };

        info!(group = %group, entries = entries.len(), mode = %mode, "group imported");
        Ok(GroupState {
            name: request.id.name.clone(),
            table: request.id.table,
            mode,
            entries,
            bindings: Vec::new(),
        })
    }
}

/// Record what the router reports for a binding.
///
/// A binding that followed the group's numbers keeps doing so while the
/// router still matches them.
fn refresh_binding(declared: &ApplyBinding, bound: Vec<u32>, current: &[u32]) -> ApplyBinding {
    let follows_group = declared.filter_ids.as_ref().is_none_or(Vec::is_empty);
    let filter_ids = if follows_group && bound == current {
        None
    } else {
        Some(bound)
    };
    ApplyBinding {
        interface: declared.interface.clone(),
        direction: declared.direction,
        filter_ids,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{BindingSlot, Direction, Entry, FilterAction, IpRule};
    use crate::testing::{DeviceCall, MemoryDevice};
    use pretty_assertions::assert_eq;

    fn rule(protocol: &str) -> IpRule {
        IpRule::new(FilterAction::Pass, protocol)
    }

    fn auto_decl(name: &str, protocols: &[&str]) -> GroupDecl<IpRule> {
        GroupDecl {
            name: name.into(),
            table: FilterTable::Ip,
            mode: SequencingMode::Auto { start: 10, step: 10 },
            entries: protocols.iter().map(|p| Entry::new(rule(p))).collect(),
            bindings: Vec::new(),
        }
    }

    fn controller(device: &MemoryDevice<IpRule>) -> GroupController<'_, MemoryDevice<IpRule>> {
        GroupController::new(device, ControllerOptions::default())
    }

    fn lan_in() -> ApplyBinding {
        ApplyBinding::new("lan1", Direction::In)
    }

    // ── Create / read ───────────────────────────────────────────────

    #[tokio::test]
    async fn create_then_read_returns_both_entries() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);

        let state = ctl.create(&auto_decl("g1", &["tcp", "udp"])).await.unwrap();
        assert_eq!(state.numbers(), vec![10, 20]);
        assert_eq!(
            device.mutations(),
            vec![
                DeviceCall::Define(FilterTable::Ip, 10),
                DeviceCall::Define(FilterTable::Ip, 20),
            ]
        );

        let read = ctl.read(&state).await.unwrap().unwrap();
        assert_eq!(read, state);
    }

    #[tokio::test]
    async fn create_binds_group_numbers_by_default() {
        let device = MemoryDevice::new();
        let mut decl = auto_decl("g1", &["tcp", "udp"]);
        decl.bindings.push(lan_in());

        controller(&device).create(&decl).await.unwrap();
        assert_eq!(
            device.binding(FilterTable::Ip, &lan_in().slot()),
            Some(vec![10, 20])
        );
    }

    #[tokio::test]
    async fn binding_conflict_fails_before_any_device_call() {
        let device = MemoryDevice::new();
        let mut decl = auto_decl("g1", &["tcp"]);
        decl.bindings = vec![lan_in(), lan_in().with_filter_ids(vec![10])];

        let err = controller(&device).create(&decl).await.unwrap_err();
        assert!(matches!(err, CoreError::BindingConflict { .. }));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn manual_group_without_numbers_fails_before_any_device_call() {
        let device = MemoryDevice::new();
        let decl = GroupDecl {
            name: "g1".into(),
            table: FilterTable::Ip,
            mode: SequencingMode::Manual,
            entries: vec![Entry::numbered(5, rule("tcp")), Entry::new(rule("udp"))],
            bindings: Vec::new(),
        };
        let err = controller(&device).create(&decl).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingSequence { index: 1 }));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn create_refuses_foreign_numbers() {
        let device = MemoryDevice::new();
        device.seed_entries(
            FilterTable::Ip,
            &[RealizedEntry {
                number: 20,
                rule: rule("icmp"),
            }],
        );

        let err = controller(&device)
            .create(&auto_decl("g1", &["tcp", "udp"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SequenceCollision { .. }));
        assert!(device.mutations().is_empty());
    }

    #[tokio::test]
    async fn collision_check_can_be_disabled() {
        let device = MemoryDevice::new();
        device.seed_entries(
            FilterTable::Ip,
            &[RealizedEntry {
                number: 20,
                rule: rule("icmp"),
            }],
        );
        let ctl = GroupController::new(
            &device,
            ControllerOptions {
                preflight_collisions: false,
            },
        );
        ctl.create(&auto_decl("g1", &["tcp", "udp"])).await.unwrap();
        assert_eq!(device.entry(FilterTable::Ip, 20), Some(rule("udp")));
    }

    #[tokio::test]
    async fn read_drops_missing_numbers_and_reports_absence() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let state = ctl.create(&auto_decl("g1", &["tcp", "udp"])).await.unwrap();

        device.remove_entry(FilterTable::Ip, 10);
        let read = ctl.read(&state).await.unwrap().unwrap();
        assert_eq!(read.numbers(), vec![20]);

        device.remove_entry(FilterTable::Ip, 20);
        assert!(ctl.read(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_keeps_recorded_binding_when_listing_fails() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();

        device.fail_on(|call| matches!(call, DeviceCall::ListBound(..)));
        let read = ctl.read(&state).await.unwrap().unwrap();
        assert_eq!(read.bindings, vec![lan_in()]);
    }

    #[tokio::test]
    async fn read_records_drifted_binding() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp", "udp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();

        device.seed_binding(FilterTable::Ip, lan_in().slot(), vec![20, 10]);
        let read = ctl.read(&state).await.unwrap().unwrap();
        assert_eq!(read.bindings, vec![lan_in().with_filter_ids(vec![20, 10])]);

        device.seed_binding(FilterTable::Ip, lan_in().slot(), Vec::new());
        let read = ctl.read(&state).await.unwrap().unwrap();
        assert!(read.bindings.is_empty());
    }

    // ── Update ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn shrinking_a_group_deletes_only_the_removed_number() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let state = ctl.create(&auto_decl("g1", &["tcp", "udp"])).await.unwrap();
        device.clear_calls();

        let next = ctl
            .update(&state, &auto_decl("g1", &["tcp"]))
            .await
            .unwrap();

        assert_eq!(next.numbers(), vec![10]);
        assert_eq!(
            device.mutations(),
            vec![
                DeviceCall::Delete(FilterTable::Ip, 20),
                DeviceCall::Define(FilterTable::Ip, 10),
            ]
        );
    }

    #[tokio::test]
    async fn update_rebinds_fallback_when_numbers_change() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp", "udp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();

        let mut next = auto_decl("g1", &["tcp", "udp", "icmp"]);
        next.bindings.push(lan_in());
        ctl.update(&state, &next).await.unwrap();

        assert_eq!(
            device.binding(FilterTable::Ip, &lan_in().slot()),
            Some(vec![10, 20, 30])
        );
    }

    #[tokio::test]
    async fn update_leaves_unchanged_bindings_alone() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp", "udp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();
        device.clear_calls();

        ctl.update(&state, &decl).await.unwrap();
        assert!(
            !device
                .calls()
                .iter()
                .any(|c| matches!(c, DeviceCall::Bind(..) | DeviceCall::Unbind(..)))
        );
    }

    #[tokio::test]
    async fn update_owns_its_previous_numbers() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let state = ctl.create(&auto_decl("g1", &["tcp", "udp"])).await.unwrap();

        let mut shifted = auto_decl("g1", &["tcp", "udp"]);
        shifted.mode = SequencingMode::Auto { start: 20, step: 10 };
        let next = ctl.update(&state, &shifted).await.unwrap();
        assert_eq!(next.numbers(), vec![20, 30]);
        assert_eq!(device.entry_numbers(FilterTable::Ip), BTreeSet::from([20, 30]));
    }

    #[tokio::test]
    async fn switching_numbering_mode_is_rejected() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let state = ctl.create(&auto_decl("g1", &["tcp"])).await.unwrap();
        device.clear_calls();

        let manual = GroupDecl {
            mode: SequencingMode::Manual,
            entries: vec![Entry::numbered(10, rule("tcp"))],
            ..auto_decl("g1", &[])
        };
        let err = ctl.update(&state, &manual).await.unwrap_err();
        assert!(matches!(err, CoreError::ModeChange { .. }));
        assert!(device.calls().is_empty());
    }

    // ── Delete ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn delete_unbinds_before_deleting() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp", "udp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();
        device.clear_calls();

        ctl.delete(&state).await.unwrap();
        assert_eq!(
            device.mutations(),
            vec![
                DeviceCall::Unbind(FilterTable::Ip, lan_in().slot()),
                DeviceCall::Delete(FilterTable::Ip, 10),
                DeviceCall::Delete(FilterTable::Ip, 20),
            ]
        );
        assert!(device.entry_numbers(FilterTable::Ip).is_empty());
    }

    #[tokio::test]
    async fn failed_unbind_leaves_entries_in_place() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();

        device.fail_on(|call| matches!(call, DeviceCall::Unbind(..)));
        let err = ctl.delete(&state).await.unwrap_err();
        assert!(matches!(err, CoreError::BindingsFailed { .. }));
        assert_eq!(device.entry_numbers(FilterTable::Ip), BTreeSet::from([10]));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let device = MemoryDevice::new();
        let ctl = controller(&device);
        let mut decl = auto_decl("g1", &["tcp"]);
        decl.bindings.push(lan_in());
        let state = ctl.create(&decl).await.unwrap();

        ctl.delete(&state).await.unwrap();
        ctl.delete(&state).await.unwrap();
        assert!(device.entry_numbers(FilterTable::Ip).is_empty());
        assert_eq!(
            device.binding(FilterTable::Ip, &BindingSlot::new("lan1", Direction::In)),
            None
        );
    }

    // ── Import ──────────────────────────────────────────────────────

    fn seed(device: &MemoryDevice<IpRule>, numbers: &[u32]) {
        let entries: Vec<_> = numbers
            .iter()
            .map(|&number| RealizedEntry {
                number,
                rule: rule("tcp"),
            })
            .collect();
        device.seed_entries(FilterTable::Ip, &entries);
    }

    #[tokio::test]
    async fn import_skips_missing_candidates() {
        let device = MemoryDevice::new();
        seed(&device, &[5, 7]);

        let state = controller(&device)
            .import(&ImportRequest {
                id: GroupId::new(FilterTable::Ip, "g2"),
                numbers: vec![5, 6, 7],
                start: None,
                step: None,
            })
            .await
            .unwrap();

        assert_eq!(state.mode, SequencingMode::Manual);
        assert_eq!(state.numbers(), vec![5, 7]);
        assert!(device.mutations().is_empty());
    }

    #[tokio::test]
    async fn import_with_nothing_found_fails() {
        let device = MemoryDevice::new();
        let err = controller(&device)
            .import(&ImportRequest {
                id: GroupId::new(FilterTable::Ip, "g2"),
                numbers: vec![5, 6],
                start: None,
                step: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ImportEmpty { .. }));
    }

    #[tokio::test]
    async fn import_with_series_checks_the_found_numbers() {
        let device = MemoryDevice::new();
        seed(&device, &[100, 110, 130]);
        let ctl = controller(&device);

        let state = ctl
            .import(&ImportRequest {
                id: GroupId::new(FilterTable::Ip, "g3"),
                numbers: vec![100, 110],
                start: Some(100),
                step: None,
            })
            .await
            .unwrap();
        assert_eq!(
            state.mode,
            SequencingMode::Auto {
                start: 100,
                step: 10
            }
        );

        let err = ctl
            .import(&ImportRequest {
                id: GroupId::new(FilterTable::Ip, "g3"),
                numbers: vec![100, 120, 130],
                start: Some(100),
                step: Some(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ImportMismatch { .. }));
    }

    #[tokio::test]
    async fn imported_state_round_trips_through_update() {
        let device = MemoryDevice::new();
        seed(&device, &[5, 7]);
        let ctl = controller(&device);
        let state = ctl
            .import(&ImportRequest {
                id: GroupId::new(FilterTable::Ip, "g2"),
                numbers: vec![5, 7],
                start: None,
                step: None,
            })
            .await
            .unwrap();

        let next = ctl.update(&state, &state.to_decl()).await.unwrap();
        assert_eq!(next, state);
    }
}
