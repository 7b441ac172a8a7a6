pub mod eeprom;
pub mod sd_card;
