#![allow(clippy::unwrap_used)]
// In-memory router used by the engine's unit tests.
//
// Records every call in order and can be told to fail selected calls, which
// is how partial-failure behavior is exercised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::device::{DeviceError, FilterDevice};
use crate::model::{BindingSlot, Direction, FilterTable, RealizedEntry, RulePayload};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Define(FilterTable, u32),
    Delete(FilterTable, u32),
    Get(FilterTable, u32),
    Bind(FilterTable, BindingSlot, Vec<u32>),
    Unbind(FilterTable, BindingSlot),
    ListBound(FilterTable, BindingSlot),
    ListNumbers(FilterTable),
    Save,
}

impl DeviceCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Define(..) | Self::Delete(..) | Self::Bind(..) | Self::Unbind(..) | Self::Save
        )
    }
}

type Matcher = Box<dyn Fn(&DeviceCall) -> bool + Send + Sync>;

struct Inner<P> {
    entries: BTreeMap<(FilterTable, u32), P>,
    bindings: BTreeMap<(FilterTable, BindingSlot), Vec<u32>>,
    calls: Vec<DeviceCall>,
    failures: Vec<Matcher>,
}

pub struct MemoryDevice<P> {
    inner: Mutex<Inner<P>>,
}

impl<P: RulePayload> MemoryDevice<P> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                bindings: BTreeMap::new(),
                calls: Vec::new(),
                failures: Vec::new(),
            }),
        }
    }

    pub fn seed_entries(&self, table: FilterTable, entries: &[RealizedEntry<P>]) {
        let mut inner = self.inner.lock().unwrap();
        for entry in entries {
            inner
                .entries
                .insert((table, entry.number), entry.rule.clone());
        }
    }

    pub fn seed_binding(&self, table: FilterTable, slot: BindingSlot, numbers: Vec<u32>) {
        self.inner
            .lock()
            .unwrap()
            .bindings
            .insert((table, slot), numbers);
    }

    pub fn remove_entry(&self, table: FilterTable, number: u32) {
        self.inner.lock().unwrap().entries.remove(&(table, number));
    }

    /// Fail every call matching `matcher` until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, matcher: impl Fn(&DeviceCall) -> bool + Send + Sync + 'static) {
        self.inner.lock().unwrap().failures.push(Box::new(matcher));
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<DeviceCall> {
        self.calls()
            .into_iter()
            .filter(DeviceCall::is_mutation)
            .collect()
    }

    pub fn entry_numbers(&self, table: FilterTable) -> BTreeSet<u32> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .keys()
            .filter(|(t, _)| *t == table)
            .map(|(_, n)| *n)
            .collect()
    }

    pub fn entry(&self, table: FilterTable, number: u32) -> Option<P> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(&(table, number))
            .cloned()
    }

    pub fn binding(&self, table: FilterTable, slot: &BindingSlot) -> Option<Vec<u32>> {
        self.inner
            .lock()
            .unwrap()
            .bindings
            .get(&(table, slot.clone()))
            .cloned()
    }

    fn record(inner: &mut Inner<P>, call: DeviceCall) -> Result<(), DeviceError> {
        let failed = inner.failures.iter().any(|m| m(&call));
        inner.calls.push(call);
        if failed {
            return Err(DeviceError::Operation {
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

impl<P: RulePayload> Default for MemoryDevice<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RulePayload> FilterDevice for MemoryDevice<P> {
    type Payload = P;

    async fn define_entry(
        &self,
        table: FilterTable,
        number: u32,
        payload: &P,
    ) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::Define(table, number))?;
        inner.entries.insert((table, number), payload.clone());
        Ok(())
    }

    async fn delete_entry(&self, table: FilterTable, number: u32) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::Delete(table, number))?;
        inner
            .entries
            .remove(&(table, number))
            .map(|_| ())
            .ok_or(DeviceError::NotFound)
    }

    async fn get_entry(&self, table: FilterTable, number: u32) -> Result<P, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::Get(table, number))?;
        inner
            .entries
            .get(&(table, number))
            .cloned()
            .ok_or(DeviceError::NotFound)
    }

    async fn bind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
        numbers: &[u32],
    ) -> Result<(), DeviceError> {
        let slot = BindingSlot::new(interface, direction);
        let mut inner = self.inner.lock().unwrap();
        Self::record(
            &mut inner,
            DeviceCall::Bind(table, slot.clone(), numbers.to_vec()),
        )?;
        if numbers.is_empty() {
            return Err(DeviceError::Operation {
                message: "empty filter list".into(),
            });
        }
        inner.bindings.insert((table, slot), numbers.to_vec());
        Ok(())
    }

    async fn unbind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<(), DeviceError> {
        let slot = BindingSlot::new(interface, direction);
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::Unbind(table, slot.clone()))?;
        inner
            .bindings
            .remove(&(table, slot))
            .map(|_| ())
            .ok_or(DeviceError::NotFound)
    }

    async fn list_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<Vec<u32>, DeviceError> {
        let slot = BindingSlot::new(interface, direction);
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::ListBound(table, slot.clone()))?;
        Ok(inner
            .bindings
            .get(&(table, slot))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_entry_numbers(&self, table: FilterTable) -> Result<BTreeSet<u32>, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::ListNumbers(table))?;
        Ok(inner
            .entries
            .keys()
            .filter(|(t, _)| *t == table)
            .map(|(_, n)| *n)
            .collect())
    }

    async fn save(&self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        Self::record(&mut inner, DeviceCall::Save)
    }
}
