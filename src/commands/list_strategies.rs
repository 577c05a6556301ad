use crate::strategy::STRATEGY_TYPES;

pub fn run() {
    for strategy_type in STRATEGY_TYPES {
        println!("{}", strategy_type);
    }
}
