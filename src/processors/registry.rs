use crate::error::TraceError;
use crate::models::{EventKind, TraceEvent};
use crate::processors::plugin::{AnalysisPlugin, PluginArgs, ReportContext};
use crate::processors::reqsize::RequestSize;
use crate::processors::{c2d, d2c, i2c, merge, plug, q2c, reqsize, seek};
use lazy_static::lazy_static;
use serde::Serialize;

type Constructor = fn(&PluginArgs) -> Result<Box<dyn AnalysisPlugin>, TraceError>;

/// Static description of one plugin.
pub struct PluginDescriptor {
    pub name: &'static str,
    pub events: &'static [EventKind],
    pub construct: Constructor,
}

/// Position of the request size accumulator, read by the others at report time.
pub const REQUEST_SIZE_INDEX: usize = 0;

/// Every plugin, in report order.
pub const PLUGINS: &[PluginDescriptor] = &[
    PluginDescriptor {
        name: "reqsize",
        events: reqsize::EVENTS,
        construct: |_| Ok(Box::new(RequestSize::new())),
    },
    PluginDescriptor {
        name: "seek",
        events: seek::EVENTS,
        construct: |_| Ok(Box::new(seek::SeekDistance::new())),
    },
    PluginDescriptor {
        name: "merge",
        events: merge::EVENTS,
        construct: |_| Ok(Box::new(merge::MergeRatio::new())),
    },
    PluginDescriptor {
        name: "plug",
        events: plug::EVENTS,
        construct: |_| Ok(Box::new(plug::PlugTime::new())),
    },
    PluginDescriptor {
        name: "d2c",
        events: d2c::EVENTS,
        construct: |args| Ok(Box::new(d2c::D2C::new(args)?)),
    },
    PluginDescriptor {
        name: "q2c",
        events: q2c::EVENTS,
        construct: |_| Ok(Box::new(q2c::Q2C::new())),
    },
    PluginDescriptor {
        name: "i2c",
        events: i2c::EVENTS,
        construct: |args| Ok(Box::new(i2c::I2C::new(args)?)),
    },
    PluginDescriptor {
        name: "c2d",
        events: c2d::EVENTS,
        construct: |_| Ok(Box::new(c2d::C2D::new())),
    },
];

/// Plugins plus the event kind -> plugin indices table, built once.
pub struct PluginRegistry {
    plugins: &'static [PluginDescriptor],
    dispatch: [Vec<usize>; EventKind::COUNT],
}

impl PluginRegistry {
    pub fn new(plugins: &'static [PluginDescriptor]) -> Self {
        let dispatch = std::array::from_fn(|kind| {
            plugins
                .iter()
                .enumerate()
                .filter(|(_, p)| p.events.iter().any(|e| e.index() == kind))
                .map(|(idx, _)| idx)
                .collect()
        });
        Self { plugins, dispatch }
    }

    pub fn plugins(&self) -> &'static [PluginDescriptor] {
        self.plugins
    }

    /// Indices of the plugins interested in `kind`, in registry order.
    pub fn handlers(&self, kind: EventKind) -> &[usize] {
        &self.dispatch[kind.index()]
    }
}

lazy_static! {
    pub static ref REGISTRY: PluginRegistry = PluginRegistry::new(PLUGINS);
}

/// Report of one plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginReport {
    pub name: String,
    pub lines: Vec<String>,
}

/// One instance of every registered plugin, in registry order.
pub struct PluginSet {
    plugins: Vec<Box<dyn AnalysisPlugin>>,
}

impl PluginSet {
    pub fn new(args: &PluginArgs) -> Result<Self, TraceError> {
        let plugins = REGISTRY
            .plugins()
            .iter()
            .map(|desc| (desc.construct)(args))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plugins })
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn plugin(&self, idx: usize) -> Option<&dyn AnalysisPlugin> {
        self.plugins.get(idx).map(|p| p.as_ref())
    }

    /// Concrete plugin at `idx`.
    pub fn get<T: AnalysisPlugin>(&self, idx: usize) -> Option<&T> {
        self.plugin(idx).and_then(|p| p.as_any().downcast_ref::<T>())
    }

    pub fn feed(&mut self, event: &TraceEvent) {
        for idx in REGISTRY.handlers(event.kind()) {
            self.plugins[*idx].feed(event);
        }
    }

    /// Folds every plugin of `other` into the matching plugin of `self`.
    pub fn merge(&mut self, other: &PluginSet) {
        for (mine, theirs) in self.plugins.iter_mut().zip(other.plugins.iter()) {
            mine.merge(theirs.as_ref());
        }
    }

    pub fn close(&mut self) {
        self.plugins.iter_mut().for_each(|p| p.close());
    }

    pub fn context(&self) -> ReportContext {
        self.get::<RequestSize>(REQUEST_SIZE_INDEX)
            .map(RequestSize::context)
            .unwrap_or_default()
    }

    pub fn report(&self) -> Vec<PluginReport> {
        let ctx = self.context();
        REGISTRY
            .plugins()
            .iter()
            .zip(self.plugins.iter())
            .map(|(desc, plugin)| PluginReport {
                name: desc.name.to_string(),
                lines: plugin.report(&ctx),
            })
            .collect()
    }
}
