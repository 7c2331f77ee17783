use crate::settings::ModelSettings;
use crate::vfs::path_equal;

/// Picks the skeleton model for an actor. Werewolf form wins over beast
/// races, which win over the female body.
pub fn get_actor_skeleton(
    models: &ModelSettings,
    first_person: bool,
    is_female: bool,
    is_beast: bool,
    is_werewolf: bool,
) -> &str {
    if !first_person {
        if is_werewolf {
            models.wolfskin.as_str()
        } else if is_beast {
            models.baseanimkna.as_str()
        } else if is_female {
            models.baseanimfemale.as_str()
        } else {
            models.baseanim.as_str()
        }
    } else if is_werewolf {
        models.wolfskin1st.as_str()
    } else if is_beast {
        models.baseanimkna1st.as_str()
    } else if is_female {
        models.baseanimfemale1st.as_str()
    } else {
        models.xbaseanim1st.as_str()
    }
}

/// Whether `model` is one of the stock third-person skeletons.
pub fn is_default_actor_skeleton(models: &ModelSettings, model: &str) -> bool {
    [&models.baseanimkna, &models.baseanimfemale, &models.baseanim]
        .into_iter()
        .any(|default| path_equal(default, model))
}

/// Inserts `suffix` in front of the last `.` of `filename`, or appends it
/// when there is none.
pub fn add_suffix_before_extension(filename: &str, suffix: &str) -> String {
    match filename.rfind('.') {
        Some(dot) => format!("{}{suffix}{}", &filename[..dot], &filename[dot..]),
        None => format!("{filename}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_person_selection_order() {
        let models = ModelSettings::default();
        assert_eq!(
            get_actor_skeleton(&models, false, false, false, false),
            "meshes/base_anim.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, false, true, false, false),
            "meshes/base_anim_female.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, false, true, true, false),
            "meshes/base_animkna.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, false, true, true, true),
            "meshes/wolf/skin.nif"
        );
    }

    #[test]
    fn first_person_selection_order() {
        let models = ModelSettings::default();
        assert_eq!(
            get_actor_skeleton(&models, true, false, false, false),
            "meshes/xbase_anim.1st.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, true, true, false, false),
            "meshes/base_anim_female.1st.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, true, false, true, false),
            "meshes/base_animkna.1st.nif"
        );
        assert_eq!(
            get_actor_skeleton(&models, true, false, true, true),
            "meshes/wolf/skin.1st.nif"
        );
    }

    #[test]
    fn default_skeletons_match_regardless_of_case_and_separator() {
        let models = ModelSettings::default();
        assert!(is_default_actor_skeleton(&models, "Meshes\\Base_AnimKnA.nif"));
        assert!(is_default_actor_skeleton(&models, "meshes/base_anim_female.nif"));
        assert!(!is_default_actor_skeleton(&models, "meshes/wolf/skin.nif"));
        assert!(!is_default_actor_skeleton(&models, "meshes/xbase_anim.1st.nif"));
    }

    #[test]
    fn suffix_lands_before_extension() {
        assert_eq!(
            add_suffix_before_extension("meshes/base_anim.nif", ".1st"),
            "meshes/base_anim.1st.nif"
        );
        assert_eq!(add_suffix_before_extension("skeleton", "_x"), "skeleton_x");
        assert_eq!(add_suffix_before_extension("a.b.kf", "_1"), "a.b_1.kf");
    }
}
