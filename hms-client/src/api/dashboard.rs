//! Dashboard aggregates. Both reads go stale on any patient movement.

use hms_core::{ApiRequest, EntityTag, QueryDescriptor};

pub fn get_dashboard_stats() -> QueryDescriptor {
    QueryDescriptor::new("getDashboardStats", &(), ApiRequest::get("/dashboard/stats"))
        .provides([EntityTag::dashboard()])
}

pub fn get_ward_occupancy() -> QueryDescriptor {
    QueryDescriptor::new("getWardOccupancy", &(), ApiRequest::get("/dashboard/wards"))
        .provides([EntityTag::dashboard()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_reads_share_tag_not_key() {
        let stats = get_dashboard_stats();
        let wards = get_ward_occupancy();
        assert_ne!(stats.key(), wards.key());
        assert_eq!(stats.provided_tags(), wards.provided_tags());
    }
}
