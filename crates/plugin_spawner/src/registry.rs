//! The override registry: the static catalogue of overridable settings.
//!
//! Built once at spawner construction by resolving every supported setting
//! to its channel override key. A setting the channel cannot override is
//! logged and skipped; every player then simply keeps the arena default
//! for it. The catalogue covers each ship class's section plus the global
//! (non-ship) sections.

use pulsar_services::{SettingKey, SettingsClient, ShipClass};
use tracing::{debug, error, warn};

/// Immutable metadata for one overridable setting.
#[derive(Debug, Clone)]
pub struct SettingDescriptor {
    /// Config section: a ship name for ship-scoped settings, otherwise a
    /// global section such as `Bullet` or `Flag`.
    pub section: &'static str,
    pub setting: &'static str,
    /// The channel override key this setting resolved to.
    pub key: SettingKey,
    pub min: i32,
    pub max: i32,
    /// Fallback when the arena config does not define the setting.
    pub default: i32,
    /// The item property that feeds this setting, when items contribute.
    pub property: Option<&'static str>,
    /// Marks the initial resource pool setting, which is reduced by the
    /// total pending spawn-prize count before clamping.
    pub reduce_by_prizes: bool,
}

impl SettingDescriptor {
    /// Clamps a resolved raw value into this setting's legal range.
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }
}

// Table rows: (setting, min, max, default, item property).
type Row = (&'static str, i32, i32, i32, Option<&'static str>);

/// Settings registered once per ship class, under the ship's section.
const SHIP_SETTINGS: &[Row] = &[
    ("ShrapnelMax", 0, 32, 0, Some("shrapnel")),
    ("ShrapnelRate", 0, 32, 0, Some("shrapnelrate")),
    ("CloakStatus", 0, 2, 0, Some("cloak")),
    ("StealthStatus", 0, 2, 0, Some("stealth")),
    ("XRadarStatus", 0, 2, 0, Some("xradar")),
    ("AntiWarpStatus", 0, 2, 0, Some("antiwarp")),
    ("InitialGuns", 0, 3, 0, Some("gunlevel")),
    ("MaxGuns", 0, 3, 1, Some("gunlevel")),
    ("InitialBombs", 0, 3, 0, Some("bomblevel")),
    ("MaxBombs", 0, 3, 0, Some("bomblevel")),
    ("SeeMines", 0, 1, 0, Some("seemines")),
    ("SeeBombLevel", 0, 1, 0, Some("seebomblevel")),
    ("Gravity", -32767, 32767, 0, None),
    ("GravityTopSpeed", -32767, 32767, 0, None),
    ("BulletFireEnergy", 0, 32767, 0, Some("bulletfireenergy")),
    ("MultiFireEnergy", 0, 32767, 0, Some("multifireenergy")),
    ("BombFireEnergy", 0, 32767, 0, Some("bombfireenergy")),
    ("BombFireEnergyUpgrade", 0, 32767, 0, None),
    ("LandmineFireEnergy", 0, 32767, 0, Some("landminefireenergy")),
    ("LandmineFireEnergyUpgrade", 0, 32767, 0, None),
    ("CloakEnergy", -32767, 32767, 0, Some("cloakenergy")),
    ("StealthEnergy", -32767, 32767, 0, Some("stealthenergy")),
    ("AntiWarpEnergy", -32767, 32767, 0, Some("antiwarpenergy")),
    ("XRadarEnergy", -32767, 32767, 0, Some("xradarenergy")),
    ("MaximumRotation", 0, 32767, 0, Some("rotation")),
    ("MaximumThrust", 0, 32767, 0, Some("thrust")),
    ("MaximumSpeed", 0, 32767, 0, Some("speed")),
    ("MaximumRecharge", -32767, 32767, 0, Some("recharge")),
    ("MaximumEnergy", 0, 32767, 0, Some("energy")),
    ("InitialRotation", 0, 32767, 0, Some("rotation")),
    ("InitialThrust", 0, 32767, 0, Some("thrust")),
    ("InitialSpeed", 0, 32767, 0, Some("speed")),
    ("InitialRecharge", -32767, 32767, 0, Some("recharge")),
    ("InitialEnergy", 0, 32767, 0, Some("energy")),
    ("UpgradeRotation", 0, 32767, 0, None),
    ("UpgradeThrust", 0, 32767, 0, None),
    ("UpgradeSpeed", 0, 32767, 0, None),
    ("UpgradeRecharge", -32767, 32767, 0, None),
    ("UpgradeEnergy", 0, 32767, 0, None),
    ("AfterburnerEnergy", 0, 32767, 0, Some("afterburner")),
    ("DisableFastShooting", 0, 1, 0, None),
    ("BombThrust", 0, 32767, 0, None),
    ("TurretThrustPenalty", -32767, 32767, 0, None),
    ("TurretSpeedPenalty", -32767, 32767, 0, None),
    ("BulletFireDelay", 0, 32767, 0, Some("bulletfiredelay")),
    ("MultiFireDelay", 0, 32767, 0, Some("multifiredelay")),
    ("BombFireDelay", 0, 32767, 0, Some("bombfiredelay")),
    ("LandmineFireDelay", 0, 32767, 0, Some("landminefiredelay")),
    ("RocketTime", 0, 32767, 0, Some("rockettime")),
    // Reduced by pending spawn prizes so consumables granted at spawn do
    // not inflate the starting bounty.
    ("InitialBounty", 0, 32767, 0, Some("bounty")),
    ("DamageFactor", 0, 32767, 0, None),
    ("AttachBounty", 0, 32767, 0, None),
    ("SoccerThrowTime", 0, 32767, 0, None),
    ("SoccerBallProximity", 0, 32767, 0, None),
    ("MaxMines", 0, 255, 0, Some("maxmines")),
    ("RepelMax", 0, 255, 0, Some("repel")),
    ("BurstMax", 0, 255, 0, Some("burst")),
    ("DecoyMax", 0, 255, 0, Some("decoy")),
    ("ThorMax", 0, 255, 0, Some("thor")),
    ("BrickMax", 0, 255, 0, Some("brick")),
    ("RocketMax", 0, 255, 0, Some("rocket")),
    ("PortalMax", 0, 255, 0, Some("portal")),
    ("InitialRepel", 0, 255, 0, Some("repel")),
    ("InitialBurst", 0, 255, 0, Some("burst")),
    ("InitialBrick", 0, 255, 0, Some("brick")),
    ("InitialRocket", 0, 255, 0, Some("rocket")),
    ("InitialThor", 0, 255, 0, Some("thor")),
    ("InitialDecoy", 0, 255, 0, Some("decoy")),
    ("InitialPortal", 0, 255, 0, Some("portal")),
];

/// Settings registered once, outside any ship section.
const GLOBAL_SETTINGS: &[(&str, Row)] = &[
    ("Bullet", ("BulletDamageLevel", -32767, 32767, 0, Some("bulletdamage"))),
    ("Bullet", ("BulletDamageUpgrade", -32767, 32767, 0, Some("bulletdamageup"))),
    ("Burst", ("BurstDamageLevel", -32767, 32767, 0, Some("burstdamage"))),
    ("Bomb", ("BombDamageLevel", -32767, 32767, 0, Some("bombdamage"))),
    ("Bomb", ("BombExplodePixels", 0, 32767, 0, Some("explodepixels"))),
    ("Bomb", ("EBombShutdownTime", 0, 32767, 0, Some("ebombtime"))),
    ("Bomb", ("EBombDamagePercent", -32767, 32767, 0, Some("ebombdamage"))),
    ("Bomb", ("BBombDamagePercent", -32767, 32767, 0, Some("bbombdamage"))),
    ("Bomb", ("JitterTime", 0, 32767, 0, Some("jittertime"))),
    ("Misc", ("DecoyAliveTime", 0, 32767, 0, Some("decoyalive"))),
    ("Misc", ("WarpPointDelay", 0, 32767, 0, Some("warppointdelay"))),
    ("Rocket", ("RocketThrust", 0, 32767, 0, Some("rocketthrust"))),
    ("Rocket", ("RocketSpeed", 0, 32767, 0, Some("rocketspeed"))),
    ("Shrapnel", ("InactiveShrapDamage", -32767, 32767, 0, Some("inactshrapdamage"))),
    ("Shrapnel", ("ShrapnelDamagePercent", -32767, 32767, 0, Some("shrapdamage"))),
    ("Radar", ("MapZoomFactor", 1, 48, 10, Some("mapzoom"))),
    ("Flag", ("FlaggerGunUpgrade", 0, 1, 0, Some("flaggunup"))),
    ("Flag", ("FlaggerGunFireDelay", 0, 32767, 0, None)),
    ("Flag", ("FlaggerBombUpgrade", 0, 1, 0, Some("flagbombup"))),
    ("Flag", ("FlaggerBombFireDelay", 0, 32767, 0, None)),
    ("Flag", ("FlaggerFireCostPercent", 0, 32767, 0, None)),
    ("Flag", ("FlaggerSpeedAdjustment", 0, 32767, 0, None)),
    ("Flag", ("FlaggerThrustAdjustment", 0, 32767, 0, None)),
    ("Flag", ("FlaggerOnRadar", 0, 1, 0, None)),
    ("Soccer", ("AllowGuns", 0, 1, 0, Some("soccerallowguns"))),
    ("Soccer", ("AllowBombs", 0, 1, 0, Some("soccerallowbombs"))),
    ("Soccer", ("UseFlagger", 0, 1, 0, Some("socceruseflag"))),
    ("Soccer", ("BallLocation", 0, 1, 0, Some("soccerseeball"))),
];

/// The catalogue of overridable settings, resolved against one settings
/// channel. Owned by the spawner instance; dropped with it.
#[derive(Debug)]
pub struct OverrideRegistry {
    ship: [Vec<SettingDescriptor>; ShipClass::COUNT],
    global: Vec<SettingDescriptor>,
}

impl OverrideRegistry {
    /// Resolves the full catalogue. Settings without an override key and
    /// rows with inconsistent ranges are skipped, not fatal.
    pub fn build(client: &dyn SettingsClient) -> Self {
        let mut ship: [Vec<SettingDescriptor>; ShipClass::COUNT] = Default::default();
        let mut skipped = 0usize;

        for class in ShipClass::ALL {
            let section = class.name();
            let descriptors = &mut ship[class.index()];
            for row in SHIP_SETTINGS {
                match build_descriptor(client, section, row) {
                    Some(descriptor) => descriptors.push(descriptor),
                    None => skipped += 1,
                }
            }
        }

        let mut global = Vec::with_capacity(GLOBAL_SETTINGS.len());
        for (section, row) in GLOBAL_SETTINGS {
            match build_descriptor(client, *section, row) {
                Some(descriptor) => global.push(descriptor),
                None => skipped += 1,
            }
        }

        let registered: usize = ship.iter().map(Vec::len).sum::<usize>() + global.len();
        debug!(registered, skipped, "override registry built");

        Self { ship, global }
    }

    /// The descriptors for one ship class's section.
    pub fn ship_descriptors(&self, ship: ShipClass) -> &[SettingDescriptor] {
        &self.ship[ship.index()]
    }

    /// The global (non-ship-scoped) descriptors.
    pub fn global_descriptors(&self) -> &[SettingDescriptor] {
        &self.global
    }

    /// Every registered descriptor, ship sections first.
    pub fn iter_all(&self) -> impl Iterator<Item = &SettingDescriptor> {
        self.ship.iter().flatten().chain(self.global.iter())
    }

    /// Total number of registered descriptors.
    pub fn len(&self) -> usize {
        self.ship.iter().map(Vec::len).sum::<usize>() + self.global.len()
    }

    /// True when nothing could be registered at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_descriptor(
    client: &dyn SettingsClient,
    section: &'static str,
    row: &Row,
) -> Option<SettingDescriptor> {
    let (setting, min, max, default, property) = *row;

    if min > max {
        error!(section, setting, min, max, "setting range is inverted; skipping");
        return None;
    }
    if default < min || default > max {
        error!(section, setting, default, min, max, "setting default is out of range; skipping");
        return None;
    }

    let Some(key) = client.override_key(section, setting) else {
        warn!(section, setting, "unable to override setting; players keep the arena default");
        return None;
    };

    Some(SettingDescriptor {
        section,
        setting,
        key,
        min,
        max,
        default,
        property,
        reduce_by_prizes: setting == "InitialBounty",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::MockSettingsClient;

    #[test]
    fn builds_full_catalogue() {
        let client = MockSettingsClient::new();
        let registry = OverrideRegistry::build(&client);

        let expected = ShipClass::COUNT * SHIP_SETTINGS.len() + GLOBAL_SETTINGS.len();
        assert_eq!(registry.len(), expected);
        assert_eq!(registry.iter_all().count(), expected);
        assert!(!registry.is_empty());

        for class in ShipClass::ALL {
            assert_eq!(registry.ship_descriptors(class).len(), SHIP_SETTINGS.len());
        }
    }

    #[test]
    fn flags_the_resource_pool_setting() {
        let client = MockSettingsClient::new();
        let registry = OverrideRegistry::build(&client);

        let flagged: Vec<_> = registry.iter_all().filter(|d| d.reduce_by_prizes).collect();
        assert_eq!(flagged.len(), ShipClass::COUNT);
        assert!(flagged.iter().all(|d| d.setting == "InitialBounty"));
    }

    #[test]
    fn skips_settings_without_override_keys() {
        let client = MockSettingsClient::new();
        client.refuse_key("Warbird", "MaxGuns");
        client.refuse_key("Radar", "MapZoomFactor");

        let registry = OverrideRegistry::build(&client);
        let expected = ShipClass::COUNT * SHIP_SETTINGS.len() + GLOBAL_SETTINGS.len() - 2;
        assert_eq!(registry.len(), expected);
        assert!(!registry
            .ship_descriptors(ShipClass::Warbird)
            .iter()
            .any(|d| d.setting == "MaxGuns"));
        // Other ships keep their MaxGuns descriptor.
        assert!(registry
            .ship_descriptors(ShipClass::Javelin)
            .iter()
            .any(|d| d.setting == "MaxGuns"));
    }

    #[test]
    fn descriptor_clamp_covers_both_bounds() {
        let client = MockSettingsClient::new();
        let registry = OverrideRegistry::build(&client);
        let descriptor = registry
            .ship_descriptors(ShipClass::Warbird)
            .iter()
            .find(|d| d.setting == "MaxGuns")
            .unwrap();

        assert_eq!(descriptor.clamp(i32::MIN), descriptor.min);
        assert_eq!(descriptor.clamp(i32::MAX), descriptor.max);
        assert_eq!(descriptor.clamp(2), 2);
    }
}
