use crate::group::AlertGroup;

/// Whether row `index` of `group` is displayed.
///
/// `triaged_expanded` gates triaged members independently of the group's own
/// expansion flag.
pub fn should_display_alert(
    are_placeholders: bool,
    showing_triaged: bool,
    group: &AlertGroup,
    index: usize,
    triaged_expanded: bool,
) -> bool {
    if are_placeholders {
        return true;
    }
    if showing_triaged {
        return group.is_expanded || index == 0;
    }

    let Some(alert) = group.alerts.get(index) else {
        return false;
    };
    let is_first_untriaged = group.first_untriaged_index() == Some(index);
    if group.is_expanded {
        return !alert.is_triaged() || triaged_expanded || is_first_untriaged;
    }
    if alert.is_triaged() {
        return triaged_expanded;
    }
    is_first_untriaged
}

/// The expand-group affordance sits on the group's header row and only when
/// expanding would reveal more rows.
pub fn should_display_expand_group_button(
    group: &AlertGroup,
    index: usize,
    showing_triaged: bool,
) -> bool {
    if showing_triaged {
        return index == 0 && group.alerts.len() > 1;
    }
    group.first_untriaged_index() == Some(index) && group.alerts.len() > 1 + group.triaged.count
}

pub fn should_display_expand_triaged_button(
    showing_triaged: bool,
    group: &AlertGroup,
    index: usize,
) -> bool {
    if showing_triaged || group.triaged.count == 0 {
        return false;
    }
    group.first_untriaged_index() == Some(index)
}
