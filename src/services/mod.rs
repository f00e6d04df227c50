pub mod price_feed;
