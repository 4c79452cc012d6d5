//! Built-in role catalogs

use super::matcher::{RoleCatalog, TagQuery};

/// Key metrics shown on an air handling unit summary
pub fn ahu_key_metrics() -> RoleCatalog {
    RoleCatalog::new()
        .role(
            "Space Air Temp",
            TagQuery::has(&["air", "his", "point", "sensor", "temp"])
                .excluding(&["mixed", "discharge", "return", "outside"]),
        )
        .role(
            "Return Air Temp",
            TagQuery::has(&["air", "his", "point", "sensor", "temp", "return"]),
        )
        .role(
            "Supply Fan Speed",
            TagQuery::has(&["air", "his", "point", "sensor", "fan", "speed", "discharge"]),
        )
        .role(
            "Cooling",
            TagQuery::has(&["his", "point", "sensor", "cooling"]).excluding(&["heat"]),
        )
        .role(
            "Heating",
            TagQuery::has(&["his", "point", "sensor", "heat"]).excluding(&["cooling"]),
        )
        .role("CO2", TagQuery::has(&["his", "point", "sensor", "co2", "zone"]))
}

/// Metrics plotted on a generated equipment dashboard
pub fn equipment_dashboard_metrics() -> RoleCatalog {
    RoleCatalog::new()
        .role(
            "CoolValveCMD",
            TagQuery::has(&["cool", "valve", "cmd", "his", "point"]),
        )
        .role(
            "HeatValveCmd",
            TagQuery::has(&["heat", "valve", "cmd", "his", "point"]),
        )
        .role(
            "OADamperCMD",
            TagQuery::has(&["outside", "air", "damper", "his", "point"]),
        )
        .role(
            "ZoneTemp",
            TagQuery::has(&["temp", "zone", "air", "his", "point"]).excluding(&["sp"]),
        )
        .role(
            "ZoneTempSP",
            TagQuery::has(&["temp", "zone", "air", "sp", "his", "point"]),
        )
        .role(
            "MixedAirTemp",
            TagQuery::has(&["temp", "mixed", "air", "his", "point"]),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PointKind, SensorPoint};
    use crate::tags::matcher::resolve_roles;

    #[test]
    fn test_ahu_catalog_order() {
        let catalog = ahu_key_metrics();
        let names: Vec<&str> = catalog.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Space Air Temp",
                "Return Air Temp",
                "Supply Fan Speed",
                "Cooling",
                "Heating",
                "CO2"
            ]
        );
    }

    #[test]
    fn test_space_air_temp_excludes_return() {
        let rat = SensorPoint::new("rat", "ahu/rat", PointKind::Number)
            .markers(&["air", "his", "point", "sensor", "temp", "return"]);
        let resolution = resolve_roles(&[rat], &ahu_key_metrics());

        assert!(resolution.get("Space Air Temp").is_none());
        assert_eq!(resolution.selected("Return Air Temp").unwrap().entity_id, "rat");
    }

    #[test]
    fn test_zone_temp_excludes_setpoint() {
        let sp = SensorPoint::new("sp", "vav/sp", PointKind::Number)
            .markers(&["temp", "zone", "air", "sp", "his", "point"]);
        let resolution = resolve_roles(&[sp], &equipment_dashboard_metrics());

        assert!(resolution.get("ZoneTemp").is_none());
        assert!(resolution.get("ZoneTempSP").is_some());
    }
}
