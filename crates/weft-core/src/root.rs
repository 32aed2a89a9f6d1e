use std::rc::Rc;

use crate::descriptor::Descriptor;
use crate::error::RenderError;
use crate::node::InstanceNode;
use crate::props::Props;
use crate::scheduler::{DrainReport, Scheduler};
use crate::services::ServiceRegistry;

/// A mounted application tree together with its scheduler and services.
///
/// Services live exactly as long as the root: [`Root::shutdown`] unmounts the
/// tree and then drops every registered service.
pub struct Root {
    scheduler: Scheduler,
    services: Rc<ServiceRegistry>,
    node: InstanceNode,
}

impl Root {
    pub fn new(scheduler: &Scheduler, app: impl Into<Descriptor>) -> Self {
        Self::with_services(scheduler, app, ServiceRegistry::new())
    }

    pub fn with_services(
        scheduler: &Scheduler,
        app: impl Into<Descriptor>,
        services: ServiceRegistry,
    ) -> Self {
        let services = Rc::new(services);
        let node = InstanceNode::new(app.into(), scheduler.handle(), Rc::clone(&services), 0);
        Self {
            scheduler: scheduler.clone(),
            services,
            node,
        }
    }

    pub fn node(&self) -> &InstanceNode {
        &self.node
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn services(&self) -> &Rc<ServiceRegistry> {
        &self.services
    }

    /// Queues the first render and drains until settled.
    pub fn mount(&self) -> Result<DrainReport, RenderError> {
        self.scheduler.enqueue(&self.node);
        self.scheduler.drain()
    }

    /// Renders the whole tree synchronously without running effects.
    pub fn render(&self) -> Result<(), RenderError> {
        self.node.render()
    }

    pub fn run_effects(&self) -> usize {
        self.node.run_effects()
    }

    /// Replaces the root's props and schedules a render.
    pub fn set_props(&self, props: Props) {
        self.node.replace_props(props);
        self.node.schedule_render();
    }

    pub fn unmount(&self) {
        self.node.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.node.is_mounted()
    }

    pub fn shutdown(&self) {
        log::debug!("shutting down root <{}>", self.node.name());
        self.node.unmount();
        self.scheduler.discard_pending();
        self.services.clear();
    }
}
