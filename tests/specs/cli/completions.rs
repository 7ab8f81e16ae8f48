//! Shell completion specs

use crate::prelude::*;

#[test]
fn bash_completions_name_the_binary() {
    turnstile()
        .args(&["completions", "bash"])
        .passes()
        .stdout_has("_turnstile");
}

#[test]
fn completions_do_not_need_a_store() {
    turnstile().args(&["completions", "zsh"]).passes();
}
