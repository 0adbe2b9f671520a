use url::Url;

use crate::chain::{parse_address, Address};

/// Query parameter carrying a referrer address, both read on load and written
/// into generated referral links.
pub const REFERRAL_PARAM: &str = "ref";

/// Address of the page the portal is served from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(input)?,
        })
    }

    /// Raw `ref` value, if the page was opened through a referral link.
    pub fn referral_param(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == REFERRAL_PARAM)
            .map(|(_, value)| value.into_owned())
    }

    /// `ref` value when it is a syntactically valid address.
    pub fn referrer(&self) -> Option<Address> {
        parse_address(&self.referral_param()?).ok()
    }

    /// Origin and path of this page with `?ref=<address>` as the only query.
    pub fn referral_link(&self, address: &Address) -> String {
        let mut link = self.url.clone();
        link.set_fragment(None);
        link.set_query(None);
        link.query_pairs_mut()
            .append_pair(REFERRAL_PARAM, &address.to_checksum(None));
        link.into()
    }
}
