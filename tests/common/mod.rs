//! Shared fixtures: a seeded hierarchy around Dhaka and a handful of users.
#![allow(dead_code)]

use blood_request::{
    RequestService,
    geo::{GeoNode, NodeKind, SledDirectory},
    request::{NewRequest, Request},
    role::Role,
    types::BloodGroup,
    user::User,
};
use sled::open;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tracing_subscriber::EnvFilter;

pub struct Fixture {
    // keeps the database directory alive for the test
    pub dir: TempDir,
    pub service: RequestService,
    pub geo: SledDirectory,
}

// RUST_LOG=blood_request=debug shows the service spans while testing
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture(name: &str) -> anyhow::Result<Fixture> {
    init_tracing();
    // one sled database per test, sled holds a file lock
    let dir = tempdir()?;
    let db = Arc::new(open(dir.path().join(format!("{name}.db")))?);
    let service = RequestService::new(db)?;
    let geo = SledDirectory::new(service.store().clone());

    seed_hierarchy(&geo)?;
    seed_users(&geo)?;

    Ok(Fixture { dir, service, geo })
}

// parents first, children link themselves on insert
fn seed_hierarchy(geo: &SledDirectory) -> anyhow::Result<()> {
    let nodes = [
        GeoNode::new("div_dhaka", "Dhaka", NodeKind::Division),
        GeoNode::new("dis_dhaka", "Dhaka", NodeKind::District)
            .under("div_dhaka")
            .with_coordinator(Role::DistrictCoordinator, "coord_district"),
        GeoNode::new("dis_gazipur", "Gazipur", NodeKind::District).under("div_dhaka"),
        GeoNode::new("upz_savar", "Savar", NodeKind::Upazila)
            .under("dis_dhaka")
            .with_coordinator(Role::UpazilaCoordinator, "coord_upazila"),
        GeoNode::new("upz_dhamrai", "Dhamrai", NodeKind::Upazila).under("dis_dhaka"),
        GeoNode::new("team_savar", "Savar Team", NodeKind::ModeratorTeam)
            .under("upz_savar")
            .with_coordinator(Role::Moderator, "moderator"),
        GeoNode::new("upz_kaliakair", "Kaliakair", NodeKind::Upazila).under("dis_gazipur"),
        GeoNode::new("div_ctg", "Chattogram", NodeKind::Division),
        GeoNode::new("dis_cumilla", "Cumilla", NodeKind::District).under("div_ctg"),
        GeoNode::new("upz_laksam", "Laksam", NodeKind::Upazila).under("dis_cumilla"),
    ];
    for node in &nodes {
        geo.upsert_node(node)?;
    }
    Ok(())
}

fn seed_users(geo: &SledDirectory) -> anyhow::Result<()> {
    let users = [
        ("requester", Role::User, BloodGroup::OPositive, "Dhaka", "Savar"),
        ("donor", Role::User, BloodGroup::OPositive, "Dhaka", "Savar"),
        ("donor2", Role::Member, BloodGroup::OPositive, "Dhaka", "Savar"),
        ("moderator", Role::Moderator, BloodGroup::APositive, "Dhaka", "Savar"),
        ("coord_upazila", Role::UpazilaCoordinator, BloodGroup::BPositive, "Dhaka", "Savar"),
        ("coord_district", Role::DistrictCoordinator, BloodGroup::AbPositive, "Dhaka", "Dhamrai"),
        ("coord_division", Role::DivisionalCoordinator, BloodGroup::ONegative, "Gazipur", "Kaliakair"),
        ("coord_other", Role::DistrictCoordinator, BloodGroup::OPositive, "Cumilla", "Laksam"),
        ("admin", Role::Admin, BloodGroup::BNegative, "Cumilla", "Laksam"),
    ];
    for (id, role, group, district, upazila) in users {
        geo.register_user(&User::new(id, id, role, group, district, upazila))?;
    }
    Ok(())
}

pub fn register(geo: &SledDirectory, user: User) -> anyhow::Result<User> {
    geo.register_user(&user)?;
    Ok(user)
}

pub fn draft(group: BloodGroup, district: &str, upazila: &str) -> NewRequest {
    NewRequest::new()
        .set_blood_group(group)
        .set_blood_unit(1)
        .set_location(district, upazila)
        .set_hospital("Enam Medical College")
        .set_contact_number("+8801712345678")
}

pub fn open_request(
    service: &RequestService,
    requester: &str,
    district: &str,
    upazila: &str,
) -> anyhow::Result<Request> {
    Ok(service.create_request(requester, draft(BloodGroup::OPositive, district, upazila))?)
}
