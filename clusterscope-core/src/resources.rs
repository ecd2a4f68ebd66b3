//! Resource aggregation.
//!
//! Pure functions extracting the four tracked scalar kinds from a resource
//! list and folding them into running totals. Nothing here holds state; every
//! mutation of the cluster model goes through these folds.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// One entry of a resource list as delivered by the master.
///
/// Only scalar resources matter to the model. Ranges, sets and reservation
/// details are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_info: Option<AllocationInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Resource {
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: Some("SCALAR".to_string()),
            scalar: Some(Scalar { value }),
            allocation_info: None,
        }
    }

    pub fn allocated_to(mut self, role: impl Into<String>) -> Self {
        self.allocation_info = Some(AllocationInfo {
            role: Some(role.into()),
        });
        self
    }

    /// Scalar value of this entry, zero for non-scalar resources.
    pub fn value(&self) -> f64 {
        self.scalar.map(|s| s.value).unwrap_or(0.0)
    }

    pub fn tracked_kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_name(&self.name)
    }

    pub fn role(&self) -> Option<&str> {
        self.allocation_info.as_ref().and_then(|a| a.role.as_deref())
    }
}

/// The resource kinds the dashboard aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpus,
    Gpus,
    Mem,
    Disk,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Cpus,
        ResourceKind::Gpus,
        ResourceKind::Mem,
        ResourceKind::Disk,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cpus" => Some(Self::Cpus),
            "gpus" => Some(Self::Gpus),
            "mem" => Some(Self::Mem),
            "disk" => Some(Self::Disk),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpus => "cpus",
            Self::Gpus => "gpus",
            Self::Mem => "mem",
            Self::Disk => "disk",
        }
    }
}

/// Totals of the four tracked kinds.
///
/// Values are never clamped: allocation may exceed capacity and idle
/// quantities may go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarResources {
    pub cpus: f64,
    pub gpus: f64,
    pub mem: f64,
    pub disk: f64,
}

impl ScalarResources {
    pub fn new(cpus: f64, gpus: f64, mem: f64, disk: f64) -> Self {
        Self {
            cpus,
            gpus,
            mem,
            disk,
        }
    }

    /// Sum every tracked entry of `resources`.
    pub fn from_resources(resources: &[Resource]) -> Self {
        let mut totals = Self::default();
        totals.accumulate(resources);
        totals
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Cpus => self.cpus,
            ResourceKind::Gpus => self.gpus,
            ResourceKind::Mem => self.mem,
            ResourceKind::Disk => self.disk,
        }
    }

    fn slot_mut(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Cpus => &mut self.cpus,
            ResourceKind::Gpus => &mut self.gpus,
            ResourceKind::Mem => &mut self.mem,
            ResourceKind::Disk => &mut self.disk,
        }
    }

    /// Add every tracked entry, summing repeated kinds.
    pub fn accumulate(&mut self, resources: &[Resource]) {
        for resource in resources {
            if let Some(kind) = resource.tracked_kind() {
                *self.slot_mut(kind) += resource.value();
            }
        }
    }

    /// Fold used when a task is added incrementally.
    ///
    /// cpus and disk are summed; gpus and mem take the last value seen. The
    /// asymmetry is long-standing dashboard behavior and is kept as is.
    pub fn accumulate_task(&mut self, resources: &[Resource]) {
        for resource in resources {
            match resource.tracked_kind() {
                Some(kind @ (ResourceKind::Cpus | ResourceKind::Disk)) => {
                    *self.slot_mut(kind) += resource.value();
                }
                Some(kind @ (ResourceKind::Gpus | ResourceKind::Mem)) => {
                    *self.slot_mut(kind) = resource.value();
                }
                None => {}
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        ResourceKind::ALL.iter().all(|kind| self.get(*kind) == 0.0)
    }
}

impl Add for ScalarResources {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.cpus + rhs.cpus,
            self.gpus + rhs.gpus,
            self.mem + rhs.mem,
            self.disk + rhs.disk,
        )
    }
}

impl Sub for ScalarResources {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.cpus - rhs.cpus,
            self.gpus - rhs.gpus,
            self.mem - rhs.mem,
            self.disk - rhs.disk,
        )
    }
}

impl AddAssign for ScalarResources {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for ScalarResources {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Fraction of the cluster-wide total held by one framework, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Shares {
    pub cpus: f64,
    pub gpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub max: f64,
}

impl Shares {
    /// Share of `allocated` against `total`; zero wherever the total is zero.
    pub fn compute(allocated: &ScalarResources, total: &ScalarResources) -> Self {
        let share = |kind: ResourceKind| {
            let total = total.get(kind);
            if total > 0.0 {
                allocated.get(kind) / total
            } else {
                0.0
            }
        };
        let cpus = share(ResourceKind::Cpus);
        let gpus = share(ResourceKind::Gpus);
        let mem = share(ResourceKind::Mem);
        let disk = share(ResourceKind::Disk);
        Self {
            cpus,
            gpus,
            mem,
            disk,
            max: cpus.max(gpus).max(mem).max(disk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Resource> {
        vec![
            Resource::scalar("cpus", 1.0).allocated_to("a"),
            Resource::scalar("cpus", 0.5).allocated_to("b"),
            Resource::scalar("mem", 128.0),
            Resource::scalar("mem", 64.0),
            Resource::scalar("gpus", 1.0),
            Resource::scalar("disk", 10.0),
            Resource::scalar("disk", 5.0),
            Resource::scalar("ports", 31000.0),
        ]
    }

    #[test]
    fn accumulate_sums_every_kind_and_ignores_unknown_names() {
        let totals = ScalarResources::from_resources(&sample());
        assert_eq!(totals, ScalarResources::new(1.5, 1.0, 192.0, 15.0));
    }

    #[test]
    fn task_fold_sums_cpus_and_disk_but_assigns_gpus_and_mem() {
        let mut totals = ScalarResources::new(2.0, 3.0, 1000.0, 1.0);
        totals.accumulate_task(&sample());
        assert_eq!(totals, ScalarResources::new(3.5, 1.0, 64.0, 16.0));
    }

    #[test]
    fn missing_scalar_counts_as_zero() {
        let resource = Resource {
            name: "cpus".to_string(),
            kind: Some("RANGES".to_string()),
            scalar: None,
            allocation_info: None,
        };
        assert_eq!(resource.value(), 0.0);
        assert!(ScalarResources::from_resources(&[resource]).is_zero());
    }

    #[test]
    fn shares_are_zero_when_cluster_total_is_zero() {
        let allocated = ScalarResources::new(1.0, 1.0, 1.0, 1.0);
        let shares = Shares::compute(&allocated, &ScalarResources::default());
        assert_eq!(shares, Shares::default());
    }

    #[test]
    fn max_share_picks_largest_kind() {
        let allocated = ScalarResources::new(1.0, 0.0, 512.0, 0.0);
        let total = ScalarResources::new(4.0, 0.0, 1024.0, 100.0);
        let shares = Shares::compute(&allocated, &total);
        assert_eq!(shares.cpus, 0.25);
        assert_eq!(shares.mem, 0.5);
        assert_eq!(shares.max, 0.5);
    }

    #[test]
    fn resource_decodes_master_json() {
        let resource: Resource = serde_json::from_str(
            r#"{"name":"cpus","type":"SCALAR","scalar":{"value":2.5},
                "allocation_info":{"role":"web"},"reservations":[]}"#,
        )
        .unwrap();
        assert_eq!(resource.value(), 2.5);
        assert_eq!(resource.role(), Some("web"));
    }
}
