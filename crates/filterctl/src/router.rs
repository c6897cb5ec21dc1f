//! One connected router, with a device per rule family.

use filterctl_api::GatewayClient;
use filterctl_core::{
    CliFilterDevice, ControllerOptions, CoreError, FilterDevice, GroupController, ImportRequest,
    IpRule, MacRule, StandaloneBinding, binding,
};
use tracing::debug;

use crate::family::{AnyGroupDecl, AnyGroupState, Family};

pub struct RouterSession<'c> {
    ip: CliFilterDevice<&'c GatewayClient, IpRule>,
    ethernet: CliFilterDevice<&'c GatewayClient, MacRule>,
    options: ControllerOptions,
}

fn family_mismatch(prior: &AnyGroupState, decl: &AnyGroupDecl) -> CoreError {
    CoreError::InvalidIdentity {
        input: decl.id().to_string(),
        reason: format!("stored group {} holds a different rule family", prior.id()),
    }
}

impl<'c> RouterSession<'c> {
    pub fn new(client: &'c GatewayClient, options: ControllerOptions) -> Self {
        Self {
            ip: CliFilterDevice::new(client),
            ethernet: CliFilterDevice::new(client),
            options,
        }
    }

    pub async fn create(&self, decl: &AnyGroupDecl) -> Result<AnyGroupState, CoreError> {
        match decl {
            AnyGroupDecl::Ip(d) => GroupController::new(&self.ip, self.options)
                .create(d)
                .await
                .map(AnyGroupState::Ip),
            AnyGroupDecl::Ethernet(d) => GroupController::new(&self.ethernet, self.options)
                .create(d)
                .await
                .map(AnyGroupState::Ethernet),
        }
    }

    pub async fn update(
        &self,
        prior: &AnyGroupState,
        decl: &AnyGroupDecl,
    ) -> Result<AnyGroupState, CoreError> {
        match (prior, decl) {
            (AnyGroupState::Ip(p), AnyGroupDecl::Ip(d)) => {
                GroupController::new(&self.ip, self.options)
                    .update(p, d)
                    .await
                    .map(AnyGroupState::Ip)
            }
            (AnyGroupState::Ethernet(p), AnyGroupDecl::Ethernet(d)) => {
                GroupController::new(&self.ethernet, self.options)
                    .update(p, d)
                    .await
                    .map(AnyGroupState::Ethernet)
            }
            _ => Err(family_mismatch(prior, decl)),
        }
    }

    pub async fn read(&self, prior: &AnyGroupState) -> Result<Option<AnyGroupState>, CoreError> {
        Ok(match prior {
            AnyGroupState::Ip(p) => GroupController::new(&self.ip, self.options)
                .read(p)
                .await?
                .map(AnyGroupState::Ip),
            AnyGroupState::Ethernet(p) => GroupController::new(&self.ethernet, self.options)
                .read(p)
                .await?
                .map(AnyGroupState::Ethernet),
        })
    }

    pub async fn delete(&self, prior: &AnyGroupState) -> Result<(), CoreError> {
        match prior {
            AnyGroupState::Ip(p) => GroupController::new(&self.ip, self.options).delete(p).await,
            AnyGroupState::Ethernet(p) => {
                GroupController::new(&self.ethernet, self.options)
                    .delete(p)
                    .await
            }
        }
    }

    pub async fn import(&self, request: &ImportRequest) -> Result<AnyGroupState, CoreError> {
        match Family::of(request.id.table) {
            Family::Ip => GroupController::new(&self.ip, self.options)
                .import(request)
                .await
                .map(AnyGroupState::Ip),
            Family::Ethernet => GroupController::new(&self.ethernet, self.options)
                .import(request)
                .await
                .map(AnyGroupState::Ethernet),
        }
    }

    /// Move a standalone binding from `old` (if recorded) to `new`.
    pub async fn apply_binding(
        &self,
        old: Option<&StandaloneBinding>,
        new: &StandaloneBinding,
    ) -> Result<(), CoreError> {
        let old: Vec<_> = old.map(StandaloneBinding::as_binding).into_iter().collect();
        let desired = [new.as_binding()];
        let report = match Family::of(new.table) {
            Family::Ip => binding::reconcile(&self.ip, new.table, &old, &desired, &[]).await?,
            Family::Ethernet => {
                binding::reconcile(&self.ethernet, new.table, &old, &desired, &[]).await?
            }
        };
        debug!(binding = %new.id(), bound = report.bound.len(), unbound = report.unbound.len(), "standalone binding applied");
        Ok(())
    }

    /// Unbind a standalone binding's slot.
    pub async fn remove_binding(&self, old: &StandaloneBinding) -> Result<(), CoreError> {
        let bindings = [old.as_binding()];
        match Family::of(old.table) {
            Family::Ip => binding::unbind_all(&self.ip, old.table, &bindings).await?,
            Family::Ethernet => binding::unbind_all(&self.ethernet, old.table, &bindings).await?,
        };
        Ok(())
    }

    /// Current filter list of a standalone binding's slot; `None` when empty.
    pub async fn read_binding(
        &self,
        recorded: &StandaloneBinding,
    ) -> Result<Option<StandaloneBinding>, CoreError> {
        let (table, interface, direction) =
            (recorded.table, recorded.interface.as_str(), recorded.direction);
        let bound = match Family::of(table) {
            Family::Ip => {
                self.ip
                    .list_interface_filters(table, interface, direction)
                    .await
            }
            Family::Ethernet => {
                self.ethernet
                    .list_interface_filters(table, interface, direction)
                    .await
            }
        }
        .map_err(|source| CoreError::Device {
            operation: format!("read binding {}", recorded.id()),
            source,
        })?;
        Ok((!bound.is_empty()).then(|| StandaloneBinding {
            filter_ids: bound,
            ..recorded.clone()
        }))
    }

    /// Persist the router's running configuration.
    pub async fn save(&self) -> Result<(), CoreError> {
        self.ip.save().await.map_err(|source| CoreError::Device {
            operation: "save".into(),
            source,
        })
    }
}
