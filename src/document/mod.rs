//! Page elements the controller reads and writes.
//!
//! [`Document`] is the seam between the controller and whatever renders the
//! page. [`MemoryDocument`] keeps element state in a map; the CLI prints it as
//! JSON and the tests assert on it.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementId {
    ConnectWalletButton,
    WalletStatus,
    WalletAddress,
    EthBalance,
    RegistrationSection,
    DashboardSection,
    EntryPrice,
    ReferrerInput,
    RegisterButton,
    RegisterStatus,
    UserLevel,
    InternalBalance,
    TotalDirectReferrals,
    ReferralsInLevel,
    ReferralLinkOutput,
    CopyLinkButton,
    LevelsList,
    Notification,
}

impl ElementId {
    pub const ALL: [ElementId; 18] = [
        ElementId::ConnectWalletButton,
        ElementId::WalletStatus,
        ElementId::WalletAddress,
        ElementId::EthBalance,
        ElementId::RegistrationSection,
        ElementId::DashboardSection,
        ElementId::EntryPrice,
        ElementId::ReferrerInput,
        ElementId::RegisterButton,
        ElementId::RegisterStatus,
        ElementId::UserLevel,
        ElementId::InternalBalance,
        ElementId::TotalDirectReferrals,
        ElementId::ReferralsInLevel,
        ElementId::ReferralLinkOutput,
        ElementId::CopyLinkButton,
        ElementId::LevelsList,
        ElementId::Notification,
    ];

    /// `id` attribute of the element in the page markup.
    pub fn dom_id(self) -> &'static str {
        match self {
            ElementId::ConnectWalletButton => "connectWalletBtn",
            ElementId::WalletStatus => "walletStatus",
            ElementId::WalletAddress => "walletAddress",
            ElementId::EthBalance => "ethBalance",
            ElementId::RegistrationSection => "registrationSection",
            ElementId::DashboardSection => "dashboardSection",
            ElementId::EntryPrice => "entryPrice",
            ElementId::ReferrerInput => "referrerInput",
            ElementId::RegisterButton => "registerBtn",
            ElementId::RegisterStatus => "registerStatus",
            ElementId::UserLevel => "userLevel",
            ElementId::InternalBalance => "internalBalance",
            ElementId::TotalDirectReferrals => "totalDirectReferrals",
            ElementId::ReferralsInLevel => "referralsInLevel",
            ElementId::ReferralLinkOutput => "referralLinkOutput",
            ElementId::CopyLinkButton => "copyLinkBtn",
            ElementId::LevelsList => "levelsList",
            ElementId::Notification => "notification",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Neutral,
    Success,
    Error,
}

pub trait Document {
    fn text(&self, id: ElementId) -> String;
    fn set_text(&mut self, id: ElementId, text: &str);

    /// Form value of an input element.
    fn value(&self, id: ElementId) -> String;
    fn set_value(&mut self, id: ElementId, value: &str);

    fn is_visible(&self, id: ElementId) -> bool;
    fn set_visible(&mut self, id: ElementId, visible: bool);

    fn is_disabled(&self, id: ElementId) -> bool;
    fn set_disabled(&mut self, id: ElementId, disabled: bool);

    fn set_tone(&mut self, id: ElementId, tone: Tone);

    fn append_item(&mut self, id: ElementId, item: &str);
    fn clear_items(&mut self, id: ElementId);

    /// Back to the state the page is served in.
    fn reset(&mut self);
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Element {
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub visible: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    pub tone: Tone,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl Element {
    fn shown(text: &str) -> Self {
        Self {
            text: text.to_string(),
            visible: true,
            ..Self::default()
        }
    }

    fn hidden() -> Self {
        Self::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemoryDocument {
    elements: BTreeMap<ElementId, Element>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let elements = ElementId::ALL
            .into_iter()
            .map(|id| (id, initial_element(id)))
            .collect();
        Self { elements }
    }

    pub fn element(&self, id: ElementId) -> &Element {
        // Every id is inserted by `new` and never removed.
        &self.elements[&id]
    }

    pub fn tone(&self, id: ElementId) -> Tone {
        self.element(id).tone
    }

    pub fn items(&self, id: ElementId) -> &[String] {
        &self.element(id).items
    }

    fn element_mut(&mut self, id: ElementId) -> &mut Element {
        self.elements.entry(id).or_insert_with(|| initial_element(id))
    }
}

fn initial_element(id: ElementId) -> Element {
    match id {
        ElementId::ConnectWalletButton => Element::shown("Connect wallet"),
        ElementId::WalletStatus => Element::shown("Status: not connected"),
        ElementId::RegisterButton => Element::shown("Pay and register"),
        ElementId::CopyLinkButton => Element::shown("Copy link"),
        ElementId::EntryPrice => Element::shown("-"),
        ElementId::RegistrationSection | ElementId::DashboardSection | ElementId::Notification => {
            Element::hidden()
        }
        _ => Element::shown(""),
    }
}

impl Document for MemoryDocument {
    fn text(&self, id: ElementId) -> String {
        self.element(id).text.clone()
    }

    fn set_text(&mut self, id: ElementId, text: &str) {
        self.element_mut(id).text = text.to_string();
    }

    fn value(&self, id: ElementId) -> String {
        self.element(id).value.clone()
    }

    fn set_value(&mut self, id: ElementId, value: &str) {
        self.element_mut(id).value = value.to_string();
    }

    fn is_visible(&self, id: ElementId) -> bool {
        self.element(id).visible
    }

    fn set_visible(&mut self, id: ElementId, visible: bool) {
        self.element_mut(id).visible = visible;
    }

    fn is_disabled(&self, id: ElementId) -> bool {
        self.element(id).disabled
    }

    fn set_disabled(&mut self, id: ElementId, disabled: bool) {
        self.element_mut(id).disabled = disabled;
    }

    fn set_tone(&mut self, id: ElementId, tone: Tone) {
        self.element_mut(id).tone = tone;
    }

    fn append_item(&mut self, id: ElementId, item: &str) {
        self.element_mut(id).items.push(item.to_string());
    }

    fn clear_items(&mut self, id: ElementId) {
        self.element_mut(id).items.clear();
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn dom_ids_are_unique() {
        let ids: BTreeSet<_> = ElementId::ALL.iter().map(|id| id.dom_id()).collect();
        assert_eq!(ids.len(), ElementId::ALL.len());
    }

    #[test]
    fn page_starts_with_both_views_and_notification_hidden() {
        let doc = MemoryDocument::new();
        assert!(!doc.is_visible(ElementId::RegistrationSection));
        assert!(!doc.is_visible(ElementId::DashboardSection));
        assert!(!doc.is_visible(ElementId::Notification));
        assert!(doc.is_visible(ElementId::ConnectWalletButton));
        assert_eq!(doc.text(ElementId::RegisterButton), "Pay and register");
    }

    #[test]
    fn reset_discards_every_change() {
        let mut doc = MemoryDocument::new();
        doc.set_text(ElementId::WalletStatus, "Status: connected");
        doc.set_value(ElementId::ReferrerInput, "0xabc");
        doc.set_disabled(ElementId::ConnectWalletButton, true);
        doc.append_item(ElementId::LevelsList, "Level 0: requires 0 referrals");
        doc.reset();
        assert_eq!(doc, MemoryDocument::new());
    }

    #[test]
    fn serializes_keyed_by_element_name() {
        let doc = MemoryDocument::new();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["walletStatus"]["text"], "Status: not connected");
        assert_eq!(json["notification"]["visible"], false);
        assert!(json["walletStatus"].get("items").is_none());
    }
}
