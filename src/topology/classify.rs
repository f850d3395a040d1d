use crate::network::LaneClass;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Vehicle classes that make a lane a general traffic lane.
static MOTOR_CLASSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "passenger",
        "bus",
        "truck",
        "taxi",
        "delivery",
        "motorcycle",
        "tram",
        "rail",
    ]
    .into_iter()
    .collect()
});

const BICYCLE_ID_HINTS: [&str; 2] = ["bike", "bicycle"];
const PEDESTRIAN_ID_HINTS: [&str; 2] = ["pedestrian", "sidewalk"];

/// Decides which kind of traffic a lane is drawn for.
///
/// A lane is bicycle-only when bicycles are permitted and no motor class is,
/// or when its id mentions bikes. Pedestrian-only follows the same rule.
/// Bicycle wins when both apply; everything else is a motor lane.
///
/// # Parameters
/// * `id` - The lane id
/// * `allow` - The explicitly permitted classes, if listed; otherwise all
///   classes not in `disallow` are permitted
/// * `disallow` - The explicitly forbidden classes
pub fn classify_lane(id: &str, allow: Option<&[String]>, disallow: &[String]) -> LaneClass {
    let permits = |class: &str| match allow {
        Some(allow) => allow.iter().any(|c| c == class),
        None => !disallow.iter().any(|c| c == class),
    };
    let any_motor = MOTOR_CLASSES.iter().any(|class| permits(*class));
    let id = id.to_ascii_lowercase();
    let id_hints = |hints: &[&str]| hints.iter().any(|hint| id.contains(hint));

    if (permits("bicycle") && !any_motor) || id_hints(&BICYCLE_ID_HINTS[..]) {
        LaneClass::BicycleOnly
    } else if (permits("pedestrian") && !any_motor) || id_hints(&PEDESTRIAN_ID_HINTS[..]) {
        LaneClass::PedestrianOnly
    } else {
        LaneClass::Motor
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn list(classes: &str) -> Vec<String> {
        classes.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn bicycle_only_allow() {
        let allow = list("bicycle");
        assert_eq!(classify_lane("E1_1", Some(&allow), &[]), LaneClass::BicycleOnly);
        let allow = list("bicycle passenger");
        assert_eq!(classify_lane("E1_1", Some(&allow), &[]), LaneClass::Motor);
    }

    #[test]
    fn pedestrian_only_allow() {
        let allow = list("pedestrian");
        assert_eq!(classify_lane("E1_0", Some(&allow), &[]), LaneClass::PedestrianOnly);
        let allow = list("pedestrian bicycle");
        assert_eq!(classify_lane("E1_0", Some(&allow), &[]), LaneClass::BicycleOnly);
    }

    #[test]
    fn disallow_everything_motorised() {
        let disallow = list("passenger bus truck taxi delivery motorcycle tram rail");
        assert_eq!(classify_lane("E1_2", None, &disallow), LaneClass::BicycleOnly);
        let disallow = list("passenger bus truck taxi delivery motorcycle tram rail bicycle");
        assert_eq!(classify_lane("E1_2", None, &disallow), LaneClass::PedestrianOnly);
    }

    #[test]
    fn unrestricted_lanes_are_motor() {
        assert_eq!(classify_lane("E1_0", None, &[]), LaneClass::Motor);
        let disallow = list("pedestrian");
        assert_eq!(classify_lane("E1_0", None, &disallow), LaneClass::Motor);
    }

    #[test]
    fn id_fallback() {
        assert_eq!(classify_lane("BikePath_0", None, &[]), LaneClass::BicycleOnly);
        assert_eq!(classify_lane("sidewalk_3", None, &[]), LaneClass::PedestrianOnly);
    }
}
