pub mod travelpayouts;
