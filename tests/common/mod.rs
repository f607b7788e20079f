//! Shared schema fixtures: a small address-book domain used across the
//! integration tests, with builders exercising every member value type.
#![allow(dead_code)]

use trellis::rules::{self, Consume, ListRule, MapRule, StructBuilder};
use trellis::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: i32,
    pub email: Option<String>,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct PersonBuilder {
    name: Option<String>,
    age: Option<i32>,
    email: Option<String>,
    active: Option<bool>,
}

impl StructBuilder for PersonBuilder {
    type Output = Person;

    fn finish(self) -> Result<Person, Error> {
        Ok(Person {
            name: self.name.unwrap_or_default(),
            age: self.age.unwrap_or_default(),
            email: self.email,
            active: self.active.unwrap_or(true),
        })
    }
}

impl Consume<String> for PersonBuilder {
    fn consume(&mut self, member: &str, value: String) -> Result<(), Error> {
        match member {
            "name" => self.name = Some(value),
            _ => self.email = Some(value),
        }
        Ok(())
    }
}

impl Consume<i32> for PersonBuilder {
    fn consume(&mut self, _member: &str, value: i32) -> Result<(), Error> {
        self.age = Some(value);
        Ok(())
    }
}

impl Consume<bool> for PersonBuilder {
    fn consume(&mut self, _member: &str, value: bool) -> Result<(), Error> {
        self.active = Some(value);
        Ok(())
    }
}

/// `{name, age, email?, active?}` with `active` defaulting to true.
pub fn person_rule() -> MapRule<PersonBuilder> {
    MapRule::new("person", PersonBuilder::default)
        .member(rules::string("name"))
        .member(rules::integer("age"))
        .member(rules::string("email").optional())
        .member(rules::boolean("active").optional())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    pub team: String,
    pub people: Vec<Person>,
}

#[derive(Debug, Default)]
pub struct RosterBuilder {
    team: Option<String>,
    people: Vec<Person>,
}

impl StructBuilder for RosterBuilder {
    type Output = Roster;

    fn finish(self) -> Result<Roster, Error> {
        Ok(Roster {
            team: self.team.unwrap_or_default(),
            people: self.people,
        })
    }
}

impl Consume<String> for RosterBuilder {
    fn consume(&mut self, _member: &str, value: String) -> Result<(), Error> {
        self.team = Some(value);
        Ok(())
    }
}

impl Consume<Vec<Person>> for RosterBuilder {
    fn consume(&mut self, _member: &str, value: Vec<Person>) -> Result<(), Error> {
        self.people = value;
        Ok(())
    }
}

/// `{team, people: [person...]}` with a compulsory, non-empty list.
pub fn roster_rule() -> MapRule<RosterBuilder> {
    MapRule::new("roster", RosterBuilder::default)
        .member(rules::string("team"))
        .member(ListRule::new("people", person_rule()))
}

pub fn ada() -> Person {
    Person {
        name: "Ada".into(),
        age: 36,
        email: Some("ada@engine.example".into()),
        active: true,
    }
}

pub fn grace() -> Person {
    Person {
        name: "Grace".into(),
        age: 45,
        email: None,
        active: false,
    }
}
