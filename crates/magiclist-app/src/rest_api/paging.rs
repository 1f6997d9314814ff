mod parsers;

use crate::error::ApiResult;
use garde::Validate;
use magiclist_dal::ListingParams;

#[derive(Debug, Clone, Default, Validate, serde::Deserialize)]
pub struct Paging {
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    sort: Option<String>,
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(default_page_size);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let order = self
            .sort
            .as_deref()
            .map(parsers::parse_ordering)
            .transpose()?;

        Ok(ListingParams {
            offset,
            limit: page_size.into(),
            order,
        })
    }
}
