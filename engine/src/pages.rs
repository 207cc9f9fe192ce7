//! Page coordination: gated add/navigate/delete plus remote application.
//!
//! Page management follows the call, not the board: the host can always
//! manage pages, a guest only while holding a draw grant during an
//! active call. Solo (no call) use lets anyone flip through pages.
//! Receivers trust the broadcast payload — they never re-fetch the page
//! from the durable store.

use uuid::Uuid;
use wire::{PageAction, PageInfo, Payload};

use board::PageSet;

use crate::error::{Capability, EngineError};
use crate::permissions::Permissions;

/// Whether the local participant may add or delete pages.
#[must_use]
pub fn can_manage_pages(perms: &Permissions, call_active: bool) -> bool {
    if perms.is_host() || !perms.in_session() {
        return true;
    }
    call_active && perms.can_draw()
}

/// Whether the local participant may flip pages. Solo use is always
/// navigable.
#[must_use]
pub fn can_navigate(perms: &Permissions, call_active: bool) -> bool {
    !call_active || can_manage_pages(perms, call_active)
}

/// Append a fresh page and navigate to it.
pub fn add_page(
    pages: &mut PageSet,
    perms: &Permissions,
    call_active: bool,
    background_color: &str,
) -> Result<Payload, EngineError> {
    if !can_manage_pages(perms, call_active) {
        return Err(EngineError::NotPermitted(Capability::Draw));
    }
    let info = PageInfo {
        id: Uuid::new_v4(),
        page_number: u32::try_from(pages.len() + 1).unwrap_or(u32::MAX),
        background_color: background_color.to_owned(),
    };
    pages.add_page(info.clone());
    Ok(Payload::PageChange { action: PageAction::Add, page: info })
}

/// Make another page current.
pub fn navigate(
    pages: &mut PageSet,
    perms: &Permissions,
    call_active: bool,
    page_id: Uuid,
) -> Result<Payload, EngineError> {
    if !can_navigate(perms, call_active) {
        return Err(EngineError::NotPermitted(Capability::Draw));
    }
    if !pages.navigate_to(page_id) {
        return Err(EngineError::UnknownPage(page_id));
    }
    Ok(Payload::PageChange { action: PageAction::Navigate, page: pages.current().info.clone() })
}

/// Remove a page. The only page cannot be removed.
pub fn delete_page(
    pages: &mut PageSet,
    perms: &Permissions,
    call_active: bool,
    page_id: Uuid,
) -> Result<Payload, EngineError> {
    if !can_manage_pages(perms, call_active) {
        return Err(EngineError::NotPermitted(Capability::Draw));
    }
    let Some(info) = pages.page(page_id).map(|p| p.info.clone()) else {
        return Err(EngineError::UnknownPage(page_id));
    };
    if !pages.delete_page(page_id) {
        return Err(EngineError::LastPage);
    }
    Ok(Payload::PageChange { action: PageAction::Delete, page: info })
}

/// Apply a broadcast page change from a peer.
pub fn apply_remote(pages: &mut PageSet, action: PageAction, page: PageInfo) {
    match action {
        PageAction::Add => pages.add_page(page),
        PageAction::Navigate => {
            if !pages.navigate_to(page.id) {
                // The peer navigated to a page we never saw; adopt it
                // from the payload rather than re-fetching.
                pages.add_page(page);
            }
        }
        PageAction::Delete => {
            pages.delete_page(page.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wire::{ParticipantRef, ProfileKind};

    const HOST: ParticipantRef = ParticipantRef { profile_id: 1, kind: ProfileKind::Tutor };
    const GUEST: ParticipantRef = ParticipantRef { profile_id: 2, kind: ProfileKind::Student };

    fn pages() -> PageSet {
        PageSet::new(PageInfo { id: Uuid::new_v4(), page_number: 1, background_color: "#FFF".into() })
    }

    fn host_perms() -> Permissions {
        let mut perms = Permissions::new(HOST);
        perms.begin_session(HOST);
        perms
    }

    fn guest_perms() -> Permissions {
        let mut perms = Permissions::new(GUEST);
        perms.begin_session(HOST);
        perms
    }

    #[test]
    fn host_manages_pages_regardless_of_call() {
        assert!(can_manage_pages(&host_perms(), false));
        assert!(can_manage_pages(&host_perms(), true));
    }

    #[test]
    fn guest_needs_draw_grant_and_active_call() {
        let mut perms = guest_perms();
        assert!(!can_manage_pages(&perms, true));

        perms.apply_granted(wire::Capabilities::all());
        assert!(can_manage_pages(&perms, true));
        // Grant without a call is not enough.
        assert!(!can_manage_pages(&perms, false));
    }

    #[test]
    fn solo_navigation_is_free_for_all() {
        let perms = Permissions::new(GUEST);
        assert!(can_navigate(&perms, false));
    }

    #[test]
    fn guest_in_call_without_grant_cannot_navigate() {
        assert!(!can_navigate(&guest_perms(), true));
    }

    #[test]
    fn add_page_broadcasts_payload_and_navigates() {
        let mut pages = pages();
        let payload = add_page(&mut pages, &host_perms(), true, "#FAFAFA").unwrap();
        let Payload::PageChange { action, page } = payload else {
            panic!("wrong payload kind");
        };
        assert_eq!(action, PageAction::Add);
        assert_eq!(page.page_number, 2);
        assert_eq!(pages.current_id(), page.id);
    }

    #[test]
    fn delete_only_page_is_an_error() {
        let mut pages = pages();
        let only = pages.current_id();
        assert!(matches!(
            delete_page(&mut pages, &host_perms(), true, only),
            Err(EngineError::LastPage)
        ));
    }

    #[test]
    fn navigate_to_unknown_page_is_an_error() {
        let mut pages = pages();
        assert!(matches!(
            navigate(&mut pages, &host_perms(), false, Uuid::new_v4()),
            Err(EngineError::UnknownPage(_))
        ));
    }

    #[test]
    fn gated_add_is_rejected_before_any_message() {
        let mut pages = pages();
        assert!(matches!(
            add_page(&mut pages, &guest_perms(), true, "#FFF"),
            Err(EngineError::NotPermitted(_))
        ));
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn remote_add_and_navigate_trust_the_payload() {
        let mut pages = pages();
        let new_page = PageInfo { id: Uuid::new_v4(), page_number: 2, background_color: "#EEE".into() };
        apply_remote(&mut pages, PageAction::Add, new_page.clone());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.current_id(), new_page.id);

        // Navigating to a page we never saw adopts it from the payload.
        let unseen = PageInfo { id: Uuid::new_v4(), page_number: 3, background_color: "#DDD".into() };
        apply_remote(&mut pages, PageAction::Navigate, unseen.clone());
        assert_eq!(pages.current_id(), unseen.id);
    }

    #[test]
    fn remote_delete_applies() {
        let mut pages = pages();
        let second = PageInfo { id: Uuid::new_v4(), page_number: 2, background_color: "#EEE".into() };
        apply_remote(&mut pages, PageAction::Add, second.clone());
        apply_remote(&mut pages, PageAction::Delete, second);
        assert_eq!(pages.len(), 1);
    }
}
