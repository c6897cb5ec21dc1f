// Router CLI rendering of the filter table family.
//
// Every operation is one command sent through a `CommandRunner`:
//
//   ip filter 10 pass * * tcp          define
//   no ip filter 10                    delete
//   show config | grep "ip filter 10"  get
//   ip lan1 secure filter in 10 20     bind   (ethernet: `ethernet lan1 filter in ...`)
//   no ip lan1 secure filter in        unbind
//
// IP slots may also carry a `dynamic N ...` tail of stateful filters. Those
// are not managed here, so bind and unbind read the slot first and write the
// tail back.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use filterctl_api::CommandRunner;
use tracing::{debug, trace};

use super::{DeviceError, FilterDevice};
use crate::model::{Direction, FilterTable, RulePayload};

/// Command for defining entry `number` with rendered payload arguments.
pub fn define_command(table: FilterTable, number: u32, args: &str) -> String {
    format!("{} filter {number} {args}", table.keyword())
}

pub fn delete_command(table: FilterTable, number: u32) -> String {
    format!("no {} filter {number}", table.keyword())
}

fn show_entry_command(table: FilterTable, number: u32) -> String {
    format!("show config | grep \"{} filter {number}\"", table.keyword())
}

fn show_table_command(table: FilterTable) -> String {
    format!("show config | grep \"{} filter\"", table.keyword())
}

/// The `<table> <interface> ... filter <direction>` prefix naming one slot.
fn slot_prefix(table: FilterTable, interface: &str, direction: Direction) -> String {
    match table {
        FilterTable::Ip | FilterTable::Ipv6 => {
            format!("{} {interface} secure filter {direction}", table.keyword())
        }
        FilterTable::Ethernet => format!("ethernet {interface} filter {direction}"),
    }
}

fn join(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn bind_command(
    table: FilterTable,
    interface: &str,
    direction: Direction,
    numbers: &[u32],
) -> String {
    slot_command(table, interface, direction, numbers, &[])
}

/// Bind command carrying a `dynamic` tail after the static list.
fn slot_command(
    table: FilterTable,
    interface: &str,
    direction: Direction,
    numbers: &[u32],
    dynamic: &[u32],
) -> String {
    let mut command = slot_prefix(table, interface, direction);
    if !numbers.is_empty() {
        command.push(' ');
        command.push_str(&join(numbers));
    }
    if !dynamic.is_empty() {
        command.push_str(" dynamic ");
        command.push_str(&join(dynamic));
    }
    command
}

pub fn unbind_command(table: FilterTable, interface: &str, direction: Direction) -> String {
    format!("no {}", slot_prefix(table, interface, direction))
}

fn classify(err: filterctl_api::Error) -> DeviceError {
    if err.is_not_found() {
        DeviceError::NotFound
    } else {
        DeviceError::Transport(err)
    }
}

/// Extract the payload arguments of entry `number` from `show config` output.
fn find_entry_args<'a>(output: &'a str, table: FilterTable, number: u32) -> Option<&'a str> {
    let wanted = number.to_string();
    output.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix(table.keyword())?.trim_start();
        let rest = rest.strip_prefix("filter")?.trim_start();
        let (n, args) = rest.split_once(char::is_whitespace)?;
        (n == wanted).then_some(args.trim())
    })
}

/// Collect entry numbers from `show config | grep "<table> filter"` output.
fn parse_entry_numbers(output: &str, table: FilterTable) -> BTreeSet<u32> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            if tokens.next()? != table.keyword() || tokens.next()? != "filter" {
                return None;
            }
            tokens.next()?.parse::<u32>().ok()
        })
        .collect()
}

/// Filters bound to one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SlotFilters {
    numbers: Vec<u32>,
    /// Everything after the `dynamic` keyword.
    dynamic: Vec<u32>,
}

/// Parse the bind line of one slot out of `show config` output.
fn parse_slot(output: &str, prefix: &str) -> Result<SlotFilters, DeviceError> {
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix(prefix) else {
            continue;
        };
        if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
            continue;
        }
        let mut slot = SlotFilters::default();
        let mut in_dynamic = false;
        for token in rest.split_whitespace() {
            if token == "dynamic" {
                in_dynamic = true;
                continue;
            }
            let number = token.parse::<u32>().map_err(|_| DeviceError::UnexpectedOutput {
                message: format!("non-numeric filter `{token}` in `{}`", line.trim()),
            })?;
            if in_dynamic {
                slot.dynamic.push(number);
            } else {
                slot.numbers.push(number);
            }
        }
        return Ok(slot);
    }
    Ok(SlotFilters::default())
}

/// [`FilterDevice`] that drives a router through its CLI.
///
/// `P` fixes the rule family: [`IpRule`](crate::model::IpRule) for the IPv4
/// and IPv6 tables, [`MacRule`](crate::model::MacRule) for Ethernet.
pub struct CliFilterDevice<R, P> {
    runner: R,
    _payload: PhantomData<fn() -> P>,
}

impl<R: CommandRunner, P: RulePayload> CliFilterDevice<R, P> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            _payload: PhantomData,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn run(&self, command: String) -> Result<String, DeviceError> {
        trace!(command = %command, "router command");
        self.runner.run(&command).await.map_err(classify)
    }

    async fn read_slot(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<SlotFilters, DeviceError> {
        let prefix = slot_prefix(table, interface, direction);
        let output = self
            .run(format!("show config | grep \"{prefix}\""))
            .await?;
        parse_slot(&output, &prefix)
    }

    /// Dynamic filters currently bound to the slot. Ethernet slots have none.
    async fn dynamic_tail(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<Vec<u32>, DeviceError> {
        if table == FilterTable::Ethernet {
            return Ok(Vec::new());
        }
        let dynamic = self.read_slot(table, interface, direction).await?.dynamic;
        if !dynamic.is_empty() {
            debug!(table = %table, interface, direction = %direction, ?dynamic, "keeping dynamic filters");
        }
        Ok(dynamic)
    }
}

impl<R: CommandRunner, P: RulePayload> FilterDevice for CliFilterDevice<R, P> {
    type Payload = P;

    async fn define_entry(
        &self,
        table: FilterTable,
        number: u32,
        payload: &P,
    ) -> Result<(), DeviceError> {
        if !P::supports(table) {
            return Err(DeviceError::Operation {
                message: format!("payload family cannot be written to the {table} table"),
            });
        }
        let args = payload.to_device_args();
        debug!(table = %table, number, "defining filter");
        self.run(define_command(table, number, &args)).await?;
        Ok(())
    }

    async fn delete_entry(&self, table: FilterTable, number: u32) -> Result<(), DeviceError> {
        debug!(table = %table, number, "deleting filter");
        self.run(delete_command(table, number)).await?;
        Ok(())
    }

    async fn get_entry(&self, table: FilterTable, number: u32) -> Result<P, DeviceError> {
        let output = self.run(show_entry_command(table, number)).await?;
        let args = find_entry_args(&output, table, number).ok_or(DeviceError::NotFound)?;
        P::from_device_args(args).map_err(|e| DeviceError::UnexpectedOutput {
            message: e.to_string(),
        })
    }

    async fn bind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
        numbers: &[u32],
    ) -> Result<(), DeviceError> {
        if numbers.is_empty() {
            return Err(DeviceError::Operation {
                message: "the router rejects an empty filter list; unbind instead".into(),
            });
        }
        let dynamic = self.dynamic_tail(table, interface, direction).await?;
        debug!(table = %table, interface, direction = %direction, ?numbers, "binding filters");
        self.run(slot_command(table, interface, direction, numbers, &dynamic))
            .await?;
        Ok(())
    }

    async fn unbind_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<(), DeviceError> {
        let dynamic = self.dynamic_tail(table, interface, direction).await?;
        debug!(table = %table, interface, direction = %direction, "unbinding filters");
        let command = if dynamic.is_empty() {
            unbind_command(table, interface, direction)
        } else {
            slot_command(table, interface, direction, &[], &dynamic)
        };
        self.run(command).await?;
        Ok(())
    }

    async fn list_interface_filters(
        &self,
        table: FilterTable,
        interface: &str,
        direction: Direction,
    ) -> Result<Vec<u32>, DeviceError> {
        Ok(self.read_slot(table, interface, direction).await?.numbers)
    }

    async fn list_entry_numbers(&self, table: FilterTable) -> Result<BTreeSet<u32>, DeviceError> {
        let output = self.run(show_table_command(table)).await?;
        Ok(parse_entry_numbers(&output, table))
    }

    async fn save(&self) -> Result<(), DeviceError> {
        debug!("saving router configuration");
        self.run("save".to_owned()).await?;
        Ok(())
    }
}
