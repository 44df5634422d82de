mod derivation_tests;
mod helpers;
mod sequencer_tests;
mod service_tests;
