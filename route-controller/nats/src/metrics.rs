use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::{
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct EmitterMetrics {
    published: Family<SubjectLabels, Counter>,
    failures: Family<SubjectLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct SubjectLabels {
    subject: &'static str,
}

// === impl EmitterMetrics ===

impl EmitterMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let published = Family::<SubjectLabels, Counter>::default();
        reg.register(
            "published",
            "Total number of route registrations published",
            published.clone(),
        );

        let failures = Family::<SubjectLabels, Counter>::default();
        reg.register(
            "publish_failures",
            "Total number of route registrations that could not be encoded or published",
            failures.clone(),
        );

        Self {
            published,
            failures,
        }
    }

    pub(crate) fn published(&self, subject: &'static str) {
        self.published.get_or_create(&SubjectLabels { subject }).inc();
    }

    pub(crate) fn failed(&self, subject: &'static str) {
        self.failures.get_or_create(&SubjectLabels { subject }).inc();
    }

    #[cfg(test)]
    pub(crate) fn published_count(&self, subject: &'static str) -> u64 {
        self.published.get_or_create(&SubjectLabels { subject }).get()
    }

    #[cfg(test)]
    pub(crate) fn failure_count(&self, subject: &'static str) -> u64 {
        self.failures.get_or_create(&SubjectLabels { subject }).get()
    }
}
